use std::fmt;

use crate::Engine::Buffer::RingBuffer;
use crate::Engine::Structs::Transfer;
use crate::Engine::{Client, Device};

/// Debug function for Device
///
/// Shows:
/// - Name and instance index
/// - Global queue depth and open sessions
/// - Sticky fatal error, if any
///
/// Takes the device lock briefly; do not format a device while holding it.
pub fn debug_device(device: &Device, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Device")
        .field("name", &device.name())
        .field("index", &device.index())
        .field("queue_depth", &device.queue_depth())
        .field("open_clients", &device.open_clients())
        .field("fatal", &device.fatal_error())
        .finish()
}

/// Debug function for Client
pub fn debug_client(client: &Client, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Client")
        .field("id", &client.id())
        .field("device", &client.device_name())
        .field("nonblocking", &client.is_nonblocking())
        .field("outstanding", &client.outstanding_transfers())
        .finish_non_exhaustive()
}

/// Debug function for RingBuffer
///
/// Reports fill levels only; the staged words are not printed.
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("readable", &buffer.readable_bytes())
        .field("writable", &buffer.writable_bytes())
        .field("full", &buffer.is_full())
        .finish_non_exhaustive()
}

pub fn debug_transfer(transfer: &Transfer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Transfer")
        .field("id", &transfer.id())
        .field("client", &transfer.client())
        .field("state", &transfer.state())
        .field("canceled", &transfer.is_canceled())
        .finish_non_exhaustive()
}
