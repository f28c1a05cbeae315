//! Capabilities a watched object must expose.

use crate::error::MetaError;
use serde::Serialize;

/// Identifying metadata derived from a watched object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceMeta {
    /// Object kind, e.g. `Service`
    pub kind: String,
    /// Object name
    pub name: String,
    /// Object namespace, empty for cluster-scoped objects
    pub namespace: String,
}

/// Payload carried by a watch stream.
///
/// Extraction may fail; callers treat that as "metadata unknown" and keep
/// the object.
pub trait WatchObject: Send + 'static {
    /// Derives kind, name and namespace from the object.
    fn extract_meta(&self) -> Result<ResourceMeta, MetaError>;

    /// Whether downstream logic should act on this object.
    fn is_registerable(&self) -> bool;
}
