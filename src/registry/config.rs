//! Registry configuration

/// Default per-subscriber buffer, in messages
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Options for the subscriber registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Outbound buffer per subscriber. A subscriber whose buffer is full when
    /// a broadcast arrives is evicted.
    pub channel_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the per-subscriber buffer (at least 1)
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}
