//! Watch supervision.
//!
//! A [`Supervisor`] owns the lifecycle of one logical watch. It alternates
//! between two states:
//!
//! - **Acquiring**: an acquirer task retries the opener until it delivers a
//!   handle.
//! - **Consuming**: changes are read from the handle and forwarded as
//!   [`NormalizedEvent`]s. An error or end of stream drops the handle and
//!   goes back to Acquiring; the new watch starts from scratch.
//!
//! Cancellation is checked first at every suspension point, so once the token
//! fires no further event is sent.

use crate::acquirer::spawn_acquirer;
use crate::change::{ChangeKind, RawChange};
use crate::config::WatchConfig;
use crate::event::NormalizedEvent;
use crate::handle::{WatchHandle, WatchOpener};
use crate::object::WatchObject;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Supervisor state.
#[derive(Debug)]
pub enum SupervisorState<K> {
    /// Waiting for a watch to be established
    Acquiring,
    /// Reading changes from a live watch
    Consuming(WatchHandle<K>),
}

/// Keeps one resource type's watch alive until cancellation.
pub struct Supervisor<K> {
    name: String,
    opener: Arc<dyn WatchOpener<K>>,
    out: mpsc::Sender<NormalizedEvent<K>>,
    cancel: CancellationToken,
    config: Arc<WatchConfig>,
}

impl<K> std::fmt::Debug for Supervisor<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K: WatchObject> Supervisor<K> {
    /// Creates a supervisor for the watch called `name`.
    pub fn new(
        name: impl Into<String>,
        opener: Arc<dyn WatchOpener<K>>,
        out: mpsc::Sender<NormalizedEvent<K>>,
        cancel: CancellationToken,
        config: Arc<WatchConfig>,
    ) -> Self {
        Self {
            name: name.into(),
            opener,
            out,
            cancel,
            config,
        }
    }

    /// Runs until the token is cancelled or every event receiver is gone.
    pub async fn run(self) {
        let mut state = SupervisorState::Acquiring;

        while let Some(next) = self.step(state).await {
            state = next;
        }

        info!("Closing {} watch channel", self.name);
    }

    /// Advances the state machine by one transition.
    ///
    /// Returns `None` when the supervisor must stop.
    pub async fn step(&self, state: SupervisorState<K>) -> Option<SupervisorState<K>> {
        match state {
            SupervisorState::Acquiring => self.acquire().await.map(SupervisorState::Consuming),
            SupervisorState::Consuming(handle) => self.consume(handle).await,
        }
    }

    /// Waits for an acquirer to deliver a handle.
    ///
    /// An acquirer that dies without a handle while the token is still live
    /// (a panicking opener, for instance) is restarted after one retry
    /// interval.
    async fn acquire(&self) -> Option<WatchHandle<K>> {
        loop {
            let handoff = spawn_acquirer(
                self.name.clone(),
                Arc::clone(&self.opener),
                self.config.retry.clone(),
                self.cancel.clone(),
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                acquired = handoff => match acquired {
                    Ok(handle) => {
                        debug!("{} watch set", self.name);
                        return Some(handle);
                    }
                    Err(_) if self.cancel.is_cancelled() => return None,
                    Err(_) => error!(
                        "{} acquirer stopped unexpectedly, restarting in ({:?})",
                        self.name, self.config.retry.interval
                    ),
                },
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                () = tokio::time::sleep(self.config.retry.interval) => {}
            }
        }
    }

    async fn consume(&self, mut handle: WatchHandle<K>) -> Option<SupervisorState<K>> {
        let change = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                handle.close();
                return None;
            }
            change = handle.next() => change,
        };

        match &change {
            RawChange::Error(failure) => warn!("{} watch closed: {}", self.name, failure),
            RawChange::Closed => warn!("{} watch closed by server, reacquiring", self.name),
            RawChange::Bookmark { resource_version } => {
                debug!("{} watch bookmark at resource version {}", self.name, resource_version);
            }
            RawChange::Added(_) | RawChange::Modified(_) | RawChange::Deleted(_) => {}
        }

        if change.is_terminal() {
            handle.close();
            return Some(SupervisorState::Acquiring);
        }

        let Some((kind, object)) = change.into_parts() else {
            return Some(SupervisorState::Consuming(handle));
        };

        if self.forward(kind, object).await {
            Some(SupervisorState::Consuming(handle))
        } else {
            handle.close();
            None
        }
    }

    /// Pushes one event onto the output channel. Returns false if the
    /// supervisor must stop.
    async fn forward(&self, change: ChangeKind, object: K) -> bool {
        let event = NormalizedEvent::new(&self.name, change, object);
        debug!("{}", event);

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.out.send(event) => {
                if sent.is_err() {
                    warn!("Event receiver dropped, stopping {} watch", self.name);
                }
                sent.is_ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::WatchFailure;
    use crate::mock::{ScriptedOpener, TestObject};
    use std::time::Duration;

    fn svc(name: &str) -> TestObject {
        TestObject::new("Service", name, "default")
    }

    fn supervisor(
        opener: &ScriptedOpener<TestObject>,
        capacity: usize,
    ) -> (Supervisor<TestObject>, mpsc::Receiver<NormalizedEvent<TestObject>>, CancellationToken) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        let sup = Supervisor::new(
            "Services",
            Arc::new(opener.clone()),
            tx,
            cancel.clone(),
            Arc::new(WatchConfig::default()),
        );
        (sup, rx, cancel)
    }

    async fn recv(rx: &mut mpsc::Receiver<NormalizedEvent<TestObject>>) -> (ChangeKind, String) {
        let event = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed");
        (event.change, event.object.name)
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_triggers_reacquire_and_preserves_order() {
        let opener = ScriptedOpener::new("Services")
            .then_stream(vec![
                RawChange::Added(svc("a")),
                RawChange::Modified(svc("a")),
                RawChange::Error(WatchFailure::Status("too old resource version".into())),
                RawChange::Added(svc("never-read")),
            ])
            .then_stream(vec![RawChange::Added(svc("b"))]);
        let (sup, mut rx, cancel) = supervisor(&opener, 100);
        let task = tokio::spawn(sup.run());

        assert_eq!(recv(&mut rx).await, (ChangeKind::Added, "a".to_string()));
        assert_eq!(recv(&mut rx).await, (ChangeKind::Modified, "a".to_string()));
        assert_eq!(recv(&mut rx).await, (ChangeKind::Added, "b".to_string()));
        assert_eq!(opener.attempts(), 2);

        cancel.cancel();
        task.await.expect("supervisor panicked");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_triggers_reacquire() {
        let opener = ScriptedOpener::new("Services")
            .then_stream_ending(vec![RawChange::Added(svc("a"))])
            .then_fail("connection refused")
            .then_stream(vec![RawChange::Deleted(svc("a"))]);
        let (sup, mut rx, cancel) = supervisor(&opener, 100);
        let task = tokio::spawn(sup.run());

        assert_eq!(recv(&mut rx).await, (ChangeKind::Added, "a".to_string()));
        assert_eq!(recv(&mut rx).await, (ChangeKind::Deleted, "a".to_string()));
        assert_eq!(opener.attempts(), 3);

        cancel.cancel();
        task.await.expect("supervisor panicked");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bookmark_is_not_forwarded() {
        let opener = ScriptedOpener::new("Services").then_stream(vec![
            RawChange::Bookmark { resource_version: "42".into() },
            RawChange::Added(svc("a")),
        ]);
        let (sup, mut rx, cancel) = supervisor(&opener, 100);
        let task = tokio::spawn(sup.run());

        assert_eq!(recv(&mut rx).await, (ChangeKind::Added, "a".to_string()));
        assert_eq!(opener.attempts(), 1);

        cancel.cancel();
        task.await.expect("supervisor panicked");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payload_is_forwarded_without_meta() {
        let opener = ScriptedOpener::new("Services").then_stream(vec![RawChange::Added(TestObject::malformed())]);
        let (sup, mut rx, cancel) = supervisor(&opener, 100);
        let task = tokio::spawn(sup.run());

        let event = rx.recv().await.expect("event forwarded");
        assert_eq!(event.change, ChangeKind::Added);
        assert!(event.meta.is_none());

        cancel.cancel();
        task.await.expect("supervisor panicked");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_consuming_stops_forwarding() {
        let opener = ScriptedOpener::new("Services");
        let feed = opener.then_live();
        let (sup, mut rx, cancel) = supervisor(&opener, 100);
        let task = tokio::spawn(sup.run());

        feed.send(RawChange::Added(svc("a"))).expect("feed open");
        assert_eq!(recv(&mut rx).await, (ChangeKind::Added, "a".to_string()));

        cancel.cancel();
        task.await.expect("supervisor panicked");

        // Pending changes after cancellation never reach the channel
        let _ = feed.send(RawChange::Added(svc("b")));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_acquire_forwards_nothing() {
        let opener = ScriptedOpener::<TestObject>::new("Services").failing_forever("unreachable");
        let (sup, mut rx, cancel) = supervisor(&opener, 100);
        let task = tokio::spawn(sup.run());

        tokio::time::sleep(Duration::from_secs(7)).await;
        cancel.cancel();
        task.await.expect("supervisor panicked");

        assert!(rx.recv().await.is_none());
        assert_eq!(opener.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unblocks_full_channel() {
        let opener = ScriptedOpener::new("Services")
            .then_stream(vec![RawChange::Added(svc("a")), RawChange::Added(svc("b"))]);
        let (sup, mut rx, cancel) = supervisor(&opener, 1);
        let task = tokio::spawn(sup.run());

        // "a" fills the channel; the supervisor is now blocked sending "b"
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        task.await.expect("supervisor panicked");

        assert_eq!(recv(&mut rx).await, (ChangeKind::Added, "a".to_string()));
        assert!(rx.recv().await.is_none());
    }

    /// Opener whose first call panics, taking its acquirer task down.
    struct CrashOnceOpener {
        crashed: std::sync::atomic::AtomicBool,
        inner: ScriptedOpener<TestObject>,
    }

    #[async_trait::async_trait]
    impl WatchOpener<TestObject> for CrashOnceOpener {
        async fn open(&self) -> Result<WatchHandle<TestObject>, crate::error::WatchError> {
            if !self.crashed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                panic!("opener crashed");
            }
            self.inner.open().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_acquirer_is_restarted() {
        let inner = ScriptedOpener::new("Services").then_stream(vec![RawChange::Added(svc("a"))]);
        let opener = CrashOnceOpener {
            crashed: std::sync::atomic::AtomicBool::new(false),
            inner: inner.clone(),
        };
        let (tx, mut rx) = mpsc::channel(100);
        let cancel = CancellationToken::new();
        let sup = Supervisor::new(
            "Services",
            Arc::new(opener),
            tx,
            cancel.clone(),
            Arc::new(WatchConfig::default()),
        );
        let task = tokio::spawn(sup.run());

        assert_eq!(recv(&mut rx).await, (ChangeKind::Added, "a".to_string()));
        assert_eq!(inner.attempts(), 1);

        cancel.cancel();
        task.await.expect("supervisor panicked");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_debug_shows_name_only() {
        let opener = ScriptedOpener::<TestObject>::new("Services");
        let (sup, _rx, _cancel) = supervisor(&opener, 1);
        let rendered = format!("{sup:?}");
        assert!(rendered.starts_with("Supervisor { name: \"Services\""));
        assert!(rendered.ends_with(".. }"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_stops_supervisor() {
        let opener = ScriptedOpener::new("Services").then_stream(vec![RawChange::Added(svc("a"))]);
        let (sup, rx, _cancel) = supervisor(&opener, 100);
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), sup.run())
            .await
            .expect("supervisor should stop once nobody listens");
    }
}
