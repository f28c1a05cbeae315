//! Raw changes as delivered by a watch stream.

use serde::Serialize;
use std::fmt;

/// Kind of change carried by a forwarded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// Object was created
    Added,
    /// Object was updated
    Modified,
    /// Object was removed
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
        })
    }
}

/// Why a watch stream reported failure in-band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchFailure {
    /// The server sent an error/status object on the stream
    Status(String),
    /// The client failed to read or decode the stream
    Transport(String),
}

impl fmt::Display for WatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(msg) => write!(f, "status: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
        }
    }
}

/// One notification read from a watch stream.
///
/// `Error` and `Closed` both end the subscription that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum RawChange<K> {
    /// Object was created
    Added(K),
    /// Object was updated
    Modified(K),
    /// Object was removed
    Deleted(K),
    /// Progress marker with no payload
    Bookmark {
        /// Resource version the server has reached
        resource_version: String,
    },
    /// The stream reported an error
    Error(WatchFailure),
    /// The stream ended
    Closed,
}

impl<K> RawChange<K> {
    /// Returns true when this change means the subscription is dead.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Closed)
    }

    /// Splits a payload-carrying change into its kind and object.
    pub fn into_parts(self) -> Option<(ChangeKind, K)> {
        match self {
            Self::Added(obj) => Some((ChangeKind::Added, obj)),
            Self::Modified(obj) => Some((ChangeKind::Modified, obj)),
            Self::Deleted(obj) => Some((ChangeKind::Deleted, obj)),
            Self::Bookmark { .. } | Self::Error(_) | Self::Closed => None,
        }
    }

    /// Maps the payload type, leaving control variants untouched.
    pub fn map<T>(self, f: impl FnOnce(K) -> T) -> RawChange<T> {
        match self {
            Self::Added(obj) => RawChange::Added(f(obj)),
            Self::Modified(obj) => RawChange::Modified(f(obj)),
            Self::Deleted(obj) => RawChange::Deleted(f(obj)),
            Self::Bookmark { resource_version } => RawChange::Bookmark { resource_version },
            Self::Error(failure) => RawChange::Error(failure),
            Self::Closed => RawChange::Closed,
        }
    }
}
