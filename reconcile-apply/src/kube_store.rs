use async_trait::async_trait;
use kube::api::{
    DeleteParams,
    DynamicObject,
    Patch,
    PatchParams,
    PostParams,
};
use kube::core::ErrorResponse;
use reconcile_core::k8s::{
    ApiSet,
    GVK,
};
use reconcile_core::store::{
    ApplyMode,
    ObjectStore,
    PropagationPolicy,
    StoreError,
};
use tokio::sync::Mutex;

/// The concrete `ObjectStore` backing a real cluster, wrapping the same discovery-caching
/// `ApiSet` the rest of this workspace uses. `ApiSet`'s lookups take `&mut self`, so concurrent
/// callers serialize through a `tokio::sync::Mutex` -- that's purely a local cache-bookkeeping
/// detail and unrelated to the optimistic-concurrency guarantees the apply engine relies on for
/// correctness under concurrent writers.
pub struct KubeObjectStore {
    apis: Mutex<ApiSet>,
}

impl KubeObjectStore {
    pub fn new(client: kube::Client) -> KubeObjectStore {
        KubeObjectStore { apis: Mutex::new(ApiSet::new(client)) }
    }
}

fn classify_kube_error(e: kube::Error) -> StoreError {
    match e {
        kube::Error::Api(ErrorResponse { code: 404, message, .. }) => StoreError::NotFound(message),
        kube::Error::Api(ErrorResponse { code: 409, message, .. }) => StoreError::Conflict(message),
        kube::Error::Api(ErrorResponse { code: 400, message, .. }) | kube::Error::Api(ErrorResponse { code: 422, message, .. }) => {
            StoreError::Invalid(message)
        },
        kube::Error::Api(ErrorResponse { code: 403, message, .. }) => StoreError::Forbidden(message),
        kube::Error::Api(ErrorResponse { code: 408, message, .. }) | kube::Error::Api(ErrorResponse { code: 504, message, .. }) => {
            StoreError::Timeout(message)
        },
        kube::Error::Api(ErrorResponse { message, .. }) => StoreError::Other(message),
        other => StoreError::Other(other.to_string()),
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get(&self, gvk: &GVK, namespace: Option<String>, name: String) -> Result<Option<DynamicObject>, StoreError> {
        let mut apis = self.apis.lock().await;
        let (api, _) = apis
            .api_for_namespace(gvk, namespace.as_deref())
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        match api.get(&name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(ErrorResponse { code: 404, .. })) => Ok(None),
            Err(e) => Err(classify_kube_error(e)),
        }
    }

    async fn patch(&self, gvk: &GVK, obj: &DynamicObject, field_manager: &str, mode: ApplyMode) -> Result<DynamicObject, StoreError> {
        let name = obj.metadata.name.clone().ok_or_else(|| StoreError::Invalid("object has no name".into()))?;
        let mut apis = self.apis.lock().await;
        let (api, _) = apis
            .api_for_namespace(gvk, obj.metadata.namespace.as_deref())
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let mut params = PatchParams::apply(field_manager).force();
        if mode == ApplyMode::DryRun {
            params = params.dry_run();
        }

        api.patch(&name, &params, &Patch::Apply(obj)).await.map_err(classify_kube_error)
    }

    // Cleanup needs to rewrite `metadata.managedFields` directly (dropping a competing manager's
    // entry); the apiserver recomputes managedFields itself during server-side apply and ignores
    // whatever a client sends there through an apply-typed patch, so this has to go through a
    // real PUT instead of `patch()`'s SSA path.
    async fn update(&self, gvk: &GVK, obj: &DynamicObject, _field_manager: &str) -> Result<DynamicObject, StoreError> {
        let name = obj.metadata.name.clone().ok_or_else(|| StoreError::Invalid("object has no name".into()))?;
        let mut apis = self.apis.lock().await;
        let (api, _) = apis
            .api_for_namespace(gvk, obj.metadata.namespace.as_deref())
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        api.replace(&name, &PostParams::default(), obj).await.map_err(classify_kube_error)
    }

    async fn delete(&self, gvk: &GVK, namespace: Option<String>, name: String, propagation: PropagationPolicy) -> Result<(), StoreError> {
        let mut apis = self.apis.lock().await;
        let (api, _) = apis
            .api_for_namespace(gvk, namespace.as_deref())
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let dp = DeleteParams {
            propagation_policy: Some(match propagation {
                PropagationPolicy::Foreground => kube::api::PropagationPolicy::Foreground,
                PropagationPolicy::Background => kube::api::PropagationPolicy::Background,
            }),
            ..Default::default()
        };

        match api.delete(&name, &dp).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ErrorResponse { code: 404, .. })) => Ok(()),
            Err(e) => Err(classify_kube_error(e)),
        }
    }
}
