//! Shared watch configuration.

use crate::backoff::RetryPolicy;
use crate::error::WatchError;

/// Default capacity of the shared event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Configuration handed to every supervisor.
///
/// Built once by the caller and shared by reference; there is no global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Delay policy between failed attempts to open a watch
    pub retry: RetryPolicy,
    /// Capacity of the shared output channel; producers block once it is full
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl WatchConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.channel_capacity == 0 {
            return Err(WatchError::InvalidConfig(
                "event channel capacity must be greater than zero".to_string(),
            ));
        }
        self.retry.validate()
    }
}
