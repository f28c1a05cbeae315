//! Kubernetes-backed watch openers.

use crate::cluster::{ClusterObject, ClusterResource};
use crate::selector::Selector;
use futures::StreamExt;
use kube::api::{Api, WatchEvent, WatchParams};
use resource_watch::{RawChange, WatchError, WatchFailure, WatchHandle, WatchOpener};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Opens raw watches on one resource type through the API server.
///
/// Every call starts a fresh watch; nothing is kept between attempts.
pub struct KubeWatchOpener<K> {
    resource: &'static str,
    api: Api<K>,
    params: WatchParams,
    selector: Arc<Selector>,
}

impl<K> KubeWatchOpener<K> {
    /// Creates an opener for `api`. `timeout_secs` bounds each watch on the
    /// server side; when it expires the watch is reacquired.
    pub fn new(resource: &'static str, api: Api<K>, timeout_secs: u32, selector: Arc<Selector>) -> Self {
        Self {
            resource,
            api,
            params: WatchParams::default().timeout(timeout_secs),
            selector,
        }
    }
}

#[async_trait::async_trait]
impl<K> WatchOpener<ClusterObject> for KubeWatchOpener<K>
where
    K: Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    ClusterResource: From<K>,
{
    async fn open(&self) -> Result<WatchHandle<ClusterObject>, WatchError> {
        // "0": start from any cached version, existing objects arrive as Added
        let stream = self
            .api
            .watch(&self.params, "0")
            .await
            .map_err(|e| WatchError::open(self.resource, e))?;

        debug!("{} watch stream opened", self.resource);

        let selector = Arc::clone(&self.selector);
        Ok(WatchHandle::new(stream.map(move |event| {
            into_change(event).map(|obj| ClusterObject::new(obj, Arc::clone(&selector)))
        })))
    }
}

/// Maps one item of a raw watch stream into a [`RawChange`].
pub fn into_change<K>(event: Result<WatchEvent<K>, kube::Error>) -> RawChange<K> {
    match event {
        Ok(WatchEvent::Added(obj)) => RawChange::Added(obj),
        Ok(WatchEvent::Modified(obj)) => RawChange::Modified(obj),
        Ok(WatchEvent::Deleted(obj)) => RawChange::Deleted(obj),
        Ok(WatchEvent::Bookmark(bookmark)) => RawChange::Bookmark {
            resource_version: bookmark.metadata.resource_version,
        },
        Ok(WatchEvent::Error(status)) => {
            RawChange::Error(WatchFailure::Status(format!("{status} (code {})", status.code)))
        }
        Err(e) => RawChange::Error(WatchFailure::Transport(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::core::watch::{Bookmark, BookmarkMeta};
    use kube::core::{ErrorResponse, TypeMeta};

    fn service(name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_maps_object_events() {
        assert_eq!(into_change(Ok(WatchEvent::Added(service("a")))), RawChange::Added(service("a")));
        assert_eq!(into_change(Ok(WatchEvent::Modified(service("a")))), RawChange::Modified(service("a")));
        assert_eq!(into_change(Ok(WatchEvent::Deleted(service("a")))), RawChange::Deleted(service("a")));
    }

    #[test]
    fn test_object_events_are_not_terminal() {
        assert!(!into_change(Ok(WatchEvent::Added(service("a")))).is_terminal());
    }

    #[test]
    fn test_error_event_is_terminal_status_failure() {
        let change = into_change::<Service>(Ok(WatchEvent::Error(ErrorResponse {
            status: "Failure".into(),
            message: "too old resource version".into(),
            reason: "Expired".into(),
            code: 410,
        })));

        assert!(change.is_terminal());
        assert_eq!(
            change,
            RawChange::Error(WatchFailure::Status(
                "too old resource version: Expired (code 410)".into()
            ))
        );
    }

    #[test]
    fn test_stream_error_is_terminal_transport_failure() {
        let invalid = String::from_utf8(vec![0xff]).expect_err("not utf-8");
        let change = into_change::<Service>(Err(kube::Error::FromUtf8(invalid)));

        assert!(change.is_terminal());
        assert!(matches!(change, RawChange::Error(WatchFailure::Transport(_))));
    }

    #[test]
    fn test_bookmark_keeps_resource_version() {
        let change = into_change::<Service>(Ok(WatchEvent::Bookmark(Bookmark {
            types: TypeMeta::default(),
            metadata: BookmarkMeta {
                resource_version: "42".into(),
                annotations: Default::default(),
            },
        })));

        assert!(!change.is_terminal());
        assert_eq!(change, RawChange::Bookmark { resource_version: "42".into() });
    }
}
