use kube::api::DynamicObject;
use reconcile_core::constants::CLEANUP_CONFLICT_RETRY_LIMIT;
use reconcile_core::k8s::GVK;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancel::guarded;
use crate::errors::ReconcileError;
use crate::options::{
    CleanupConfig,
    Owner,
};

/// Strips configured annotations/labels and competing field-manager entries from the live
/// object, committing the change with optimistic concurrency on `resourceVersion` and retrying
/// a bounded number of times on `Conflict`.
pub async fn cleanup(
    store: &dyn reconcile_core::store::ObjectStore,
    owner: &Owner,
    gvk: &GVK,
    namespace: Option<&str>,
    name: &str,
    config: &CleanupConfig,
    cancel: &CancellationToken,
) -> Result<(), ReconcileError> {
    let mut last_conflict = None;

    for attempt in 0..=CLEANUP_CONFLICT_RETRY_LIMIT {
        let live = guarded(cancel, store.get(gvk, namespace.map(String::from), name.to_string())).await?;
        let Some(mut live) = live else {
            return Ok(());
        };

        if config.exclusions.matches(&live) {
            return Ok(());
        }

        if !strip(&mut live, owner, config) {
            return Ok(());
        }

        match guarded(cancel, store.update(gvk, &live, &owner.field_manager_name)).await {
            Ok(_) => return Ok(()),
            Err(ReconcileError::Conflict(msg)) => {
                debug!(attempt, "cleanup lost the optimistic-concurrency race, retrying");
                last_conflict = Some(ReconcileError::Conflict(msg));
            },
            Err(e) => return Err(e),
        }
    }

    Err(last_conflict.expect("loop body always sets last_conflict before exhausting its bound"))
}

fn strip(obj: &mut DynamicObject, owner: &Owner, config: &CleanupConfig) -> bool {
    let mut changed = false;

    if let Some(annotations) = obj.metadata.annotations.as_mut() {
        for key in &config.annotations {
            if annotations.remove(key).is_some() {
                changed = true;
            }
        }
    }

    if let Some(labels) = obj.metadata.labels.as_mut() {
        for key in &config.labels {
            if labels.remove(key).is_some() {
                changed = true;
            }
        }
    }

    if let Some(managed_fields) = obj.metadata.managed_fields.as_mut() {
        let before = managed_fields.len();
        managed_fields.retain(|entry| {
            if entry.manager.as_deref() == Some(owner.field_manager_name.as_str()) {
                return true;
            }
            !config
                .field_managers
                .iter()
                .any(|fm| entry.manager.as_deref() == Some(fm.name.as_str()) && entry.operation.as_deref() == Some(fm.operation_type.as_str()))
        });
        if managed_fields.len() != before {
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use kube::api::{
        ObjectMeta,
        TypeMeta,
    };
    use reconcile_core::prelude::metav1::ManagedFieldsEntry;
    use reconcile_core::store::MockObjectStore;
    use rstest::*;

    use super::*;
    use crate::options::FieldManagerRef;
    use crate::selector::Selector;

    fn owner() -> Owner {
        Owner::new("reconcile-apply", "example.com")
    }

    fn deployment_with_kubectl_manager() -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta { api_version: "apps/v1".into(), kind: "Deployment".into() }),
            metadata: ObjectMeta {
                namespace: Some("n".into()),
                name: Some("d".into()),
                annotations: Some([("kubectl.kubernetes.io/last-applied-configuration".to_string(), "test".to_string())].into()),
                managed_fields: Some(vec![
                    ManagedFieldsEntry { manager: Some("kubectl".into()), operation: Some("Apply".into()), ..Default::default() },
                    ManagedFieldsEntry { manager: Some("reconcile-apply".into()), operation: Some("Apply".into()), ..Default::default() },
                ]),
                ..Default::default()
            },
            data: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_cleanup_strips_annotation_and_competing_manager() {
        let gvk = GVK::new("apps", "v1", "Deployment");
        let live = deployment_with_kubectl_manager();
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(move |_, _, _| Ok(Some(live.clone())));
        store.expect_update().times(1).returning(|_, obj, _| Ok(obj.clone()));

        let config = CleanupConfig {
            annotations: vec!["kubectl.kubernetes.io/last-applied-configuration".into()],
            labels: vec![],
            field_managers: vec![FieldManagerRef::new("kubectl", "Apply")],
            exclusions: Selector::default(),
        };

        let cancel = CancellationToken::new();
        cleanup(&store, &owner(), &gvk, Some("n"), "d", &config, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_respects_exclusion_selector() {
        let gvk = GVK::new("apps", "v1", "Deployment");
        let mut live = deployment_with_kubectl_manager();
        live.metadata.labels = Some([("cleanup/exclusion".to_string(), "true".to_string())].into());
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(move |_, _, _| Ok(Some(live.clone())));

        let mut config = CleanupConfig {
            annotations: vec!["kubectl.kubernetes.io/last-applied-configuration".into()],
            labels: vec![],
            field_managers: vec![FieldManagerRef::new("kubectl", "Apply")],
            exclusions: Selector::default(),
        };
        config.exclusions.insert("cleanup/exclusion", "true");

        let cancel = CancellationToken::new();
        cleanup(&store, &owner(), &gvk, Some("n"), "d", &config, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_never_drops_owner_manager() {
        let gvk = GVK::new("apps", "v1", "Deployment");
        let live = deployment_with_kubectl_manager();
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(move |_, _, _| Ok(Some(live.clone())));
        store.expect_update().times(1).returning(|_, obj, _| {
            let managers: Vec<_> = obj.metadata.managed_fields.as_ref().unwrap().iter().map(|e| e.manager.clone()).collect();
            assert!(managers.contains(&Some("reconcile-apply".to_string())));
            assert!(!managers.contains(&Some("kubectl".to_string())));
            Ok(obj.clone())
        });

        let config = CleanupConfig {
            annotations: vec![],
            labels: vec![],
            field_managers: vec![FieldManagerRef::new("kubectl", "Apply")],
            exclusions: Selector::default(),
        };

        let cancel = CancellationToken::new();
        cleanup(&store, &owner(), &gvk, Some("n"), "d", &config, &cancel).await.unwrap();
    }
}
