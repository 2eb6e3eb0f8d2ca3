use std::time::Duration;

use super::Device;
use crate::Core::error::Result;
use crate::Core::transport::FifoTransport;

/// Tunables of one attached channel.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Delay before the pump retries when the upstream FIFO has no free slot
    /// or the downstream FIFO has no data yet.
    pub reschedule_interval: Duration,
    /// How long a response may stay absent before the channel is declared dead.
    pub response_timeout: Duration,
    /// Upper bound on the attach-time FIFO reset handshake.
    pub reset_timeout: Duration,
    /// Sleep between status polls during the reset handshake.
    pub reset_poll_interval: Duration,
    /// Device names are this prefix followed by the instance index.
    pub name_prefix: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            reschedule_interval: Duration::from_millis(500),
            response_timeout: Duration::from_secs(5),
            reset_timeout: Duration::from_millis(250),
            reset_poll_interval: Duration::from_millis(5),
            name_prefix: "fifolink".to_string(),
        }
    }
}

#[derive(Default)]
pub struct DeviceBuilder {
    config: DeviceConfig,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reschedule_interval(mut self, interval: Duration) -> Self {
        self.config.reschedule_interval = interval;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    pub fn with_reset_poll_interval(mut self, interval: Duration) -> Self {
        self.config.reset_poll_interval = interval;
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.name_prefix = prefix.into();
        self
    }

    /// Take over the channel behind `transport` and start its pump worker.
    pub fn attach<T: FifoTransport>(self, transport: T) -> Result<Device> {
        Device::start(self.config, Box::new(transport))
    }
}
