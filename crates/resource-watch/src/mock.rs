//! Scripted watch openers for unit testing
//!
//! This module provides a [`WatchOpener`] whose behaviour is fixed up front,
//! so supervisors can be exercised without a running API server.

use crate::change::RawChange;
use crate::error::{MetaError, WatchError};
use crate::handle::{WatchHandle, WatchOpener};
use crate::object::{ResourceMeta, WatchObject};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Minimal watched object for tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestObject {
    /// Object kind
    pub kind: String,
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
    /// Value reported by `is_registerable`
    pub registerable: bool,
    /// When set, metadata extraction fails
    pub malformed: bool,
}

impl TestObject {
    /// Creates a well-formed, non-registerable object.
    pub fn new(kind: &str, name: &str, namespace: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            registerable: false,
            malformed: false,
        }
    }

    /// Creates an object whose metadata cannot be extracted.
    pub fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::new("Status", "", "")
        }
    }

    /// Sets the registerable flag.
    #[must_use]
    pub fn registerable(mut self, registerable: bool) -> Self {
        self.registerable = registerable;
        self
    }
}

impl WatchObject for TestObject {
    fn extract_meta(&self) -> Result<ResourceMeta, MetaError> {
        if self.malformed {
            return Err(MetaError::Unrecognized(self.kind.clone()));
        }
        Ok(ResourceMeta {
            kind: self.kind.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        })
    }

    fn is_registerable(&self) -> bool {
        self.registerable
    }
}

enum Step<K> {
    Fail(String),
    /// Changes followed by a stream that stays open
    Open(Vec<RawChange<K>>),
    /// Changes followed by end of stream
    Ending(Vec<RawChange<K>>),
    /// Changes pushed by the test as it runs
    Live(mpsc::UnboundedReceiver<RawChange<K>>),
}

struct Script<K> {
    steps: VecDeque<Step<K>>,
    /// Error returned once the steps run out; `None` means the opener
    /// reports that the script is exhausted
    exhausted: Option<String>,
}

/// Mock opener replaying a fixed sequence of open results.
///
/// Clones share the script and the attempt counter.
pub struct ScriptedOpener<K> {
    resource: String,
    script: Arc<Mutex<Script<K>>>,
    attempts: Arc<AtomicUsize>,
}

impl<K> Clone for ScriptedOpener<K> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            script: Arc::clone(&self.script),
            attempts: Arc::clone(&self.attempts),
        }
    }
}

impl<K: Send + 'static> ScriptedOpener<K> {
    /// Creates an opener with an empty script.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            script: Arc::new(Mutex::new(Script {
                steps: VecDeque::new(),
                exhausted: None,
            })),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn push(self, step: Step<K>) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .steps
            .push_back(step);
        self
    }

    /// Next attempt fails with `message`.
    #[must_use]
    pub fn then_fail(self, message: &str) -> Self {
        self.push(Step::Fail(message.to_string()))
    }

    /// Next attempt succeeds; the watch yields `changes` and then stays open.
    #[must_use]
    pub fn then_stream(self, changes: Vec<RawChange<K>>) -> Self {
        self.push(Step::Open(changes))
    }

    /// Next attempt succeeds; the watch yields `changes` and then ends.
    #[must_use]
    pub fn then_stream_ending(self, changes: Vec<RawChange<K>>) -> Self {
        self.push(Step::Ending(changes))
    }

    /// Next attempt succeeds with a watch fed through the returned sender.
    ///
    /// Dropping the sender ends the watch.
    pub fn then_live(&self) -> mpsc::UnboundedSender<RawChange<K>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script
            .lock()
            .expect("script lock poisoned")
            .steps
            .push_back(Step::Live(rx));
        tx
    }

    /// Every attempt past the scripted ones fails with `message`.
    #[must_use]
    pub fn failing_forever(self, message: &str) -> Self {
        self.script.lock().expect("script lock poisoned").exhausted = Some(message.to_string());
        self
    }

    /// Number of times `open` has been called.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<K: Send + 'static> WatchOpener<K> for ScriptedOpener<K> {
    async fn open(&self) -> Result<WatchHandle<K>, WatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let step = {
            let mut script = self.script.lock().expect("script lock poisoned");
            match script.steps.pop_front() {
                Some(step) => step,
                None => Step::Fail(
                    script
                        .exhausted
                        .clone()
                        .unwrap_or_else(|| "no scripted watch left".to_string()),
                ),
            }
        };

        match step {
            Step::Fail(message) => Err(WatchError::open(&self.resource, message)),
            Step::Open(changes) => Ok(WatchHandle::new(
                stream::iter(changes).chain(stream::pending()),
            )),
            Step::Ending(changes) => Ok(WatchHandle::new(stream::iter(changes))),
            Step::Live(rx) => Ok(WatchHandle::new(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|change| (change, rx))
            }))),
        }
    }
}
