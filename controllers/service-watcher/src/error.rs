//! Controller-specific error types.
//!
//! This module defines error types specific to the Service Watcher
//! that are not covered by upstream library errors.

use resource_watch::WatchError;
use thiserror::Error;

/// Errors that can occur in the Service Watcher.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Watch pipeline could not be started
    #[error("Resource watch failed: {0}")]
    Watch(#[from] WatchError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
