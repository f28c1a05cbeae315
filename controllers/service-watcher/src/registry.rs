//! The set of cluster resources the watcher tracks.

use crate::cluster::ClusterObject;
use crate::opener::KubeWatchOpener;
use crate::selector::Selector;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::{Api, Client};
use resource_watch::{TrackedWatch, WatchError, WatchRegistry};
use std::sync::Arc;
use tracing::{error, info};

/// Settings needed to build the registry.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Namespace to watch, all namespaces when `None`
    pub namespace: Option<String>,
    /// Server-side timeout for each watch, in seconds
    pub watch_timeout_secs: u32,
    /// Selector deciding which objects are registerable
    pub selector: Arc<Selector>,
}

/// Connected cluster client watching Services and Endpoints.
pub struct ClusterRegistry {
    client: Client,
    settings: RegistrySettings,
}

impl ClusterRegistry {
    /// Builds the Kubernetes client once. Failure here is fatal.
    pub async fn connect(settings: RegistrySettings) -> Result<Self, WatchError> {
        let client = Client::try_default().await.map_err(|e| {
            error!("Failed to create Kubernetes client: {}", e);
            WatchError::Connect(e.to_string())
        })?;
        info!("Kubernetes client created");

        Ok(Self { client, settings })
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match &self.settings.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn opener<K>(&self, resource: &'static str) -> TrackedWatch<ClusterObject>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug
            + Send
            + Sync
            + 'static,
        <K as kube::Resource>::DynamicType: Default,
        crate::cluster::ClusterResource: From<K>,
    {
        let opener = KubeWatchOpener::new(
            resource,
            self.api::<K>(),
            self.settings.watch_timeout_secs,
            Arc::clone(&self.settings.selector),
        );
        TrackedWatch::new(resource, Arc::new(opener))
    }
}

impl WatchRegistry for ClusterRegistry {
    type Object = ClusterObject;

    fn tracked_watches(&self) -> Vec<TrackedWatch<ClusterObject>> {
        vec![
            self.opener::<Service>("Services"),
            self.opener::<Endpoints>("Endpoints"),
        ]
    }
}
