//! Watched cluster objects.
//!
//! Services and Endpoints share one event channel, so both are carried as a
//! [`ClusterObject`].

use crate::selector::Selector;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::Resource as _;
use resource_watch::{MetaError, ResourceMeta, WatchObject};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Payload of a Services or Endpoints watch.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ClusterResource {
    /// A Service
    Service(Box<Service>),
    /// An Endpoints object
    Endpoints(Box<Endpoints>),
}

impl ClusterResource {
    fn kind(&self) -> &'static str {
        match self {
            Self::Service(_) => Service::KIND,
            Self::Endpoints(_) => Endpoints::KIND,
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Service(svc) => &svc.metadata,
            Self::Endpoints(ep) => &ep.metadata,
        }
    }
}

impl From<Service> for ClusterResource {
    fn from(svc: Service) -> Self {
        Self::Service(Box::new(svc))
    }
}

impl From<Endpoints> for ClusterResource {
    fn from(ep: Endpoints) -> Self {
        Self::Endpoints(Box::new(ep))
    }
}

/// A watched object together with the selector that classifies it.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterObject {
    /// The Kubernetes object
    #[serde(flatten)]
    pub resource: ClusterResource,
    #[serde(skip)]
    selector: Arc<Selector>,
}

impl ClusterObject {
    /// Wraps `resource`; `selector` decides whether it is registerable.
    pub fn new(resource: impl Into<ClusterResource>, selector: Arc<Selector>) -> Self {
        Self {
            resource: resource.into(),
            selector,
        }
    }
}

impl WatchObject for ClusterObject {
    fn extract_meta(&self) -> Result<ResourceMeta, MetaError> {
        let kind = self.resource.kind();
        let meta = self.resource.metadata();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| MetaError::MissingName(kind.to_string()))?;

        Ok(ResourceMeta {
            kind: kind.to_string(),
            name,
            namespace: meta.namespace.clone().unwrap_or_default(),
        })
    }

    fn is_registerable(&self) -> bool {
        match &self.resource.metadata().labels {
            Some(labels) => self.selector.matches(labels),
            None => self.selector.matches(&BTreeMap::new()),
        }
    }
}
