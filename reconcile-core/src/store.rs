use async_trait::async_trait;
use kube::api::DynamicObject;
#[cfg(feature = "mock")]
use mockall::automock;

use crate::errors::*;
use crate::k8s::GVK;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyMode {
    /// Server-side apply with commit suppressed; the server reports what it would do.
    DryRun,
    /// Server-side apply that actually commits.
    Commit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropagationPolicy {
    Foreground,
    Background,
}

/// The narrow transport contract the apply engine drives a cluster through: get/create/patch
/// (server-side apply in either dry-run or commit mode)/update/delete. Concrete implementations
/// talk to a real apiserver; tests substitute `MockObjectStore`.
#[cfg_attr(feature = "mock", automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(
        &self,
        gvk: &GVK,
        namespace: Option<String>,
        name: String,
    ) -> Result<Option<DynamicObject>, StoreError>;

    async fn patch(
        &self,
        gvk: &GVK,
        obj: &DynamicObject,
        field_manager: &str,
        mode: ApplyMode,
    ) -> Result<DynamicObject, StoreError>;

    async fn update(&self, gvk: &GVK, obj: &DynamicObject, field_manager: &str) -> Result<DynamicObject, StoreError>;

    async fn delete(
        &self,
        gvk: &GVK,
        namespace: Option<String>,
        name: String,
        propagation: PropagationPolicy,
    ) -> Result<(), StoreError>;
}

err_impl! {StoreError,
    #[error("not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid: {0}")]
    Invalid(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
