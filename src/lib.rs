// Module naming follows project convention (Core = channel plumbing, Engine = transfer engine)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Engine;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}
pub mod ffi;

pub use Core::error::{FifoError, Result, TransportError};
pub use Core::transport::FifoTransport;
pub use Engine::{Client, Device, DeviceBuilder, Interrupter, Readiness};
