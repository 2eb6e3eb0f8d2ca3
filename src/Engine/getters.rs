use std::sync::atomic::Ordering;

use super::*;
use crate::Core::error::FifoError;
use crate::Engine::Structs::ClientId;

/// Read-only accessors used for monitoring and by the `Debug` impls.
impl Device {
    /// Instance index claimed at attach. Indices start at 1.
    pub fn index(&self) -> u32 {
        self.shared.index
    }

    /// Name of the device: the configured prefix followed by the index.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }

    /// Transfers waiting in the global queue, the active one included.
    pub fn queue_depth(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// The sticky fatal error, once the device has one.
    pub fn fatal_error(&self) -> Option<FifoError> {
        self.shared.state.lock().fatal
    }

    /// Sessions currently open on this device.
    pub fn open_clients(&self) -> usize {
        self.shared.state.lock().client_queues.len()
    }
}

impl Client {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking.load(Ordering::Relaxed)
    }

    /// Transfers this client issued that have not been read out yet.
    pub fn outstanding_transfers(&self) -> usize {
        self.device
            .state
            .lock()
            .client_queues
            .get(&self.id)
            .map_or(0, |own| own.len())
    }

    pub fn device_name(&self) -> &str {
        &self.device.name
    }
}
