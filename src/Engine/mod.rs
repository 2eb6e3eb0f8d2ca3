mod builder;
mod client;
mod consumer;
mod debug;
mod device;
mod getters;
mod producer;
mod pump;

pub use builder::{DeviceBuilder, DeviceConfig};
pub use client::{Client, Interrupter, Readiness};
pub use device::Device;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub use Buffer::{RingBuffer, RING_BYTES, RING_WORDS, WORD_SIZE}; // re-export for stable path
}

pub mod Structs {
    pub mod Transfer_Structs;
    pub use Transfer_Structs::{ClientBuffers, ClientId, Transfer, TransferId, TransferState}; // re-export for stable path
}
