//! Open watch subscriptions and the capability that creates them.

use crate::change::RawChange;
use crate::error::WatchError;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;

/// A live watch subscription.
///
/// The handle is consumed by exactly one supervisor cycle and is never reused
/// once it reports termination.
pub struct WatchHandle<K> {
    stream: BoxStream<'static, RawChange<K>>,
    closed: bool,
}

impl<K> WatchHandle<K> {
    /// Wraps a stream of changes. Exhaustion of the stream is reported as
    /// [`RawChange::Closed`].
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = RawChange<K>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            closed: false,
        }
    }

    /// Waits for the next change.
    ///
    /// Cancel-safe: dropping the returned future loses no change.
    pub async fn next(&mut self) -> RawChange<K> {
        if self.closed {
            return RawChange::Closed;
        }
        match self.stream.next().await {
            Some(change) => change,
            None => {
                self.closed = true;
                RawChange::Closed
            }
        }
    }

    /// Closes the subscription, releasing the underlying connection.
    pub fn close(self) {
        drop(self.stream);
    }
}

impl<K> fmt::Debug for WatchHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Opens watches for one resource type.
///
/// Implementations must tolerate repeated calls and keep no state between
/// failed attempts.
#[async_trait::async_trait]
pub trait WatchOpener<K>: Send + Sync {
    /// Attempts to establish a new subscription.
    async fn open(&self) -> Result<WatchHandle<K>, WatchError>;
}
