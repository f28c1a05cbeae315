//! Normalized events published on the output channel.

use crate::change::ChangeKind;
use crate::object::{ResourceMeta, WatchObject};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A change as seen by downstream consumers.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedEvent<K> {
    /// Name of the watch that produced the event, e.g. `Services`
    pub resource: String,
    /// Kind of change
    #[serde(rename = "type")]
    pub change: ChangeKind,
    /// The changed object
    pub object: K,
    /// Derived metadata, absent when extraction failed
    pub meta: Option<ResourceMeta>,
    /// Registerable flag computed at normalization time
    pub registerable: bool,
    /// When the supervisor received the change
    pub received_at: DateTime<Utc>,
}

impl<K: WatchObject> NormalizedEvent<K> {
    /// Normalizes a received change.
    ///
    /// A metadata extraction failure never drops the event.
    pub fn new(resource: impl Into<String>, change: ChangeKind, object: K) -> Self {
        let meta = object.extract_meta().ok();
        let registerable = object.is_registerable();
        Self {
            resource: resource.into(),
            change,
            object,
            meta,
            registerable,
            received_at: Utc::now(),
        }
    }
}

impl<K> fmt::Display for NormalizedEvent<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.meta {
            Some(m) => write!(
                f,
                "Event: type={} object={{Kind: {:?}, Name: {:?}, Namespace: {:?}}} registerable={}",
                self.change, m.kind, m.name, m.namespace, self.registerable
            ),
            None => write!(f, "Event: type={} object=Unknown", self.change),
        }
    }
}
