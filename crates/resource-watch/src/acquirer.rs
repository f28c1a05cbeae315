//! Watch acquisition with unbounded retry.
//!
//! An acquirer keeps calling its opener until one attempt succeeds or the
//! cancellation token fires. The first handle is delivered through a
//! single-slot handoff; nothing else is ever produced.

use crate::backoff::RetryPolicy;
use crate::handle::{WatchHandle, WatchOpener};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Opens a watch, retrying until success or cancellation.
///
/// Returns `None` only when cancelled. Open errors are logged and retried
/// according to `policy`; they are never returned.
pub async fn acquire_watch<K>(
    name: &str,
    opener: &dyn WatchOpener<K>,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Option<WatchHandle<K>> {
    let mut schedule = policy.schedule();

    loop {
        debug!("Attempting to set watch on {}", name);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            result = opener.open() => result,
        };

        let err = match result {
            Ok(handle) => return Some(handle),
            Err(e) => e,
        };

        let delay = schedule.next_delay();
        warn!("Setting {} watch failed, retry in ({:?}): {}", name, delay, err);

        tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Runs [`acquire_watch`] on its own task and hands the result off through
/// a fresh single-slot channel.
///
/// The send never blocks. If the receiver is gone by the time a handle is
/// produced, the handle is dropped on the spot, which closes it. The sender
/// is dropped without a value when the acquirer is cancelled.
pub fn spawn_acquirer<K>(
    name: String,
    opener: Arc<dyn WatchOpener<K>>,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> oneshot::Receiver<WatchHandle<K>>
where
    K: Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        if let Some(handle) = acquire_watch(&name, opener.as_ref(), &policy, &cancel).await {
            if let Err(orphan) = tx.send(handle) {
                debug!("{} watch acquired after its supervisor stopped; closing it", name);
                orphan.close();
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedOpener, TestObject};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_succeeds() {
        let opener = ScriptedOpener::<TestObject>::new("Services").then_stream(vec![]);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        let handle = acquire_watch::<TestObject>("Services", &opener, &RetryPolicy::default(), &cancel).await;

        assert!(handle.is_some());
        assert_eq!(opener.attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_on_constant_interval() {
        let failures = 4;
        let mut opener = ScriptedOpener::<TestObject>::new("Services");
        for _ in 0..failures {
            opener = opener.then_fail("connection refused");
        }
        let opener = opener.then_stream(vec![]);
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::default();

        let start = Instant::now();
        let handle = acquire_watch::<TestObject>("Services", &opener, &policy, &cancel).await;
        let elapsed = start.elapsed();

        assert!(handle.is_some());
        assert_eq!(opener.attempts(), failures + 1);
        assert!(elapsed >= policy.interval * (failures as u32 - 1));
        assert!(elapsed < policy.interval * (failures as u32 + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_wait() {
        let opener = ScriptedOpener::<TestObject>::new("Endpoints").failing_forever("unavailable");
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let handle = acquire_watch::<TestObject>("Endpoints", &opener, &RetryPolicy::default(), &cancel).await;

        assert!(handle.is_none());
        // Attempts at 0s, 2s and 4s before the cancel at 5s
        assert_eq!(opener.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_opens_nothing() {
        let opener = ScriptedOpener::<TestObject>::new("Services").then_stream(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let rx = spawn_acquirer::<TestObject>(
            "Services".to_string(),
            Arc::new(opener.clone()),
            RetryPolicy::default(),
            cancel,
        );

        assert!(rx.await.is_err());
        assert_eq!(opener.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_handoff_does_not_block() {
        let opener = ScriptedOpener::<TestObject>::new("Services").then_stream(vec![]);
        let rx = spawn_acquirer::<TestObject>(
            "Services".to_string(),
            Arc::new(opener.clone()),
            RetryPolicy::default(),
            CancellationToken::new(),
        );
        drop(rx);

        // The acquirer task finishes on its own
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(opener.attempts(), 1);
    }
}
