//! Watch fan-in.
//!
//! Starts one [`Supervisor`] per tracked resource type. All of them share a
//! single bounded output channel and a single cancellation token.

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::event::NormalizedEvent;
use crate::handle::WatchOpener;
use crate::object::WatchObject;
use crate::supervisor::Supervisor;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One resource type to keep a watch on.
pub struct TrackedWatch<K> {
    /// Name used in events and logs, e.g. `Services`
    pub name: String,
    /// Opener for this resource type
    pub opener: Arc<dyn WatchOpener<K>>,
}

impl<K> std::fmt::Debug for TrackedWatch<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedWatch")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<K> TrackedWatch<K> {
    /// Creates a tracked watch.
    pub fn new(name: impl Into<String>, opener: Arc<dyn WatchOpener<K>>) -> Self {
        Self {
            name: name.into(),
            opener,
        }
    }
}

/// A connected registry client that knows which resource types to watch.
pub trait WatchRegistry {
    /// Payload type shared by every watch of this registry
    type Object: WatchObject;

    /// Resource types to supervise.
    fn tracked_watches(&self) -> Vec<TrackedWatch<Self::Object>>;
}

/// Starts every watch of the registry returned by `connect`.
///
/// `connect` is awaited exactly once; its failure is returned right away and
/// nothing is started. Individual watch failures are never returned: each
/// supervisor retries on its own. The receiver is handed back before any
/// watch is established, and yields `None` once every supervisor has stopped.
pub async fn start_watches<R, F>(
    config: WatchConfig,
    connect: F,
    cancel: CancellationToken,
) -> Result<mpsc::Receiver<NormalizedEvent<R::Object>>, WatchError>
where
    R: WatchRegistry,
    F: Future<Output = Result<R, WatchError>>,
{
    config.validate()?;

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let registry = connect.await?;
    let config = Arc::new(config);

    for watch in registry.tracked_watches() {
        info!("Starting {} watcher", watch.name);
        let supervisor = Supervisor::new(
            watch.name,
            watch.opener,
            tx.clone(),
            cancel.clone(),
            Arc::clone(&config),
        );
        tokio::spawn(supervisor.run());
    }

    Ok(rx)
}
