//! Watch pipeline errors

use thiserror::Error;

/// Errors that can occur while establishing watches.
///
/// Only [`WatchError::Connect`] and [`WatchError::InvalidConfig`] ever reach the
/// caller of [`crate::start_watches`]. Open failures are retried internally and
/// only show up in the logs.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The registry client could not be constructed
    #[error("Failed to connect to resource registry: {0}")]
    Connect(String),

    /// A single attempt to open a watch failed
    #[error("Failed to open {resource} watch: {message}")]
    Open {
        /// Resource type the watch was opened for
        resource: String,
        /// Underlying client error, rendered
        message: String,
    },

    /// Invalid watch configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WatchError {
    /// Builds an [`WatchError::Open`] for the given resource type.
    pub fn open(resource: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Open {
            resource: resource.into(),
            message: err.to_string(),
        }
    }
}

/// Errors returned when metadata cannot be derived from a watched object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaError {
    /// The object carries no name
    #[error("object of kind {0} has no name")]
    MissingName(String),

    /// The object shape is not one we know how to read
    #[error("unrecognized object: {0}")]
    Unrecognized(String),
}
