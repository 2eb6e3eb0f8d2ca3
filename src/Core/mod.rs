pub mod error;
pub mod layout;
pub mod loopback;
pub mod registry;
pub mod transport;

pub use error::{FifoError, Result, TransportError};
pub use layout::Status;
pub use loopback::Loopback;
pub use transport::FifoTransport;
