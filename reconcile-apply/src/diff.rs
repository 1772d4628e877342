use std::collections::BTreeSet;

use kube::api::DynamicObject;
use kube::ResourceExt;
use reconcile_core::constants::*;
use reconcile_core::k8s::{
    GVK,
    DIFF_IGNORED_METADATA_FIELDS,
};
use reconcile_core::object::Subject;
use reconcile_core::store::{
    ApplyMode,
    ObjectStore,
    StoreError,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancel::guarded;
use crate::errors::ReconcileError;
use crate::options::{
    ApplyOptions,
    Owner,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DiffOutcome {
    Unchanged,
    Configured { diff_paths: Vec<String> },
    Created,
    Skipped,
    NeedsForce,
}

// Substrings anchoring the exact server messages observed when server-side apply rejects a
// change to an immutable field (see scenario 3: Secret `data` once `immutable: true` is set),
// plus RBAC's roleRef invariant and StorageClass parameter immutability.
const IMMUTABLE_MESSAGE_PATTERNS: &[&str] = &["field is immutable", "roleRef", "parameters is forbidden"];

fn looks_immutable(msg: &str) -> bool {
    IMMUTABLE_MESSAGE_PATTERNS.iter().any(|p| msg.contains(p))
}

fn is_ssa_override(obj: &DynamicObject, group: &str) -> bool {
    let key = group_key(group, SSA_ANNOTATION_SUFFIX);
    obj.annotations().get(&key).is_some_and(|v| v == SSA_OVERRIDE_VALUE)
}

/// Performs the diff procedure for a single object: if-not-present/exclusion gating, then a
/// server-side dry-run compared against the live object (ignoring server-managed bookkeeping
/// fields and `status`).
pub async fn diff_object(
    store: &dyn ObjectStore,
    owner: &Owner,
    gvk: &GVK,
    obj: &DynamicObject,
    opts: &ApplyOptions,
    cancel: &CancellationToken,
) -> Result<DiffOutcome, ReconcileError> {
    let subject = Subject::from_dynamic_obj(obj).map_err(|e| ReconcileError::Other(e.to_string()))?;
    let namespace = obj.namespace();
    let name = obj.name_any();

    let current = guarded(cancel, store.get(gvk, namespace, name)).await?;

    if !opts.if_not_present_selector.is_empty()
        && opts.if_not_present_selector.matches(obj)
        && !is_ssa_override(obj, &owner.group)
        && current.is_some()
    {
        debug!(%subject, "skipped: if-not-present selector matched an existing object");
        return Ok(DiffOutcome::Skipped);
    }

    let excluded = opts.exclusion_selector.matches(obj)
        || current.as_ref().is_some_and(|live| opts.exclusion_selector.matches(live));
    if excluded {
        debug!(%subject, "skipped: exclusion selector matched");
        return Ok(DiffOutcome::Skipped);
    }

    let dry_run = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ReconcileError::Cancelled("apply cancelled".into())),
        res = store.patch(gvk, obj, &owner.field_manager_name, ApplyMode::DryRun) => res,
    };
    let dry_run_obj = match dry_run {
        Ok(o) => o,
        Err(StoreError::Invalid(msg)) => {
            if looks_immutable(&msg) {
                debug!(%subject, "dry-run rejected an immutable field");
                return Ok(DiffOutcome::NeedsForce);
            }
            return Err(ReconcileError::Invalid(format!("{subject} dry-run failed (Invalid): {msg}")));
        },
        Err(other) => return Err(other.into()),
    };

    match &current {
        None => Ok(DiffOutcome::Created),
        Some(live) => {
            let paths = diff_paths(live, &dry_run_obj);
            if paths.is_empty() {
                Ok(DiffOutcome::Unchanged)
            } else {
                Ok(DiffOutcome::Configured { diff_paths: paths })
            }
        },
    }
}

fn ignored_paths() -> Vec<String> {
    let mut paths: Vec<String> = DIFF_IGNORED_METADATA_FIELDS.iter().map(|f| format!("metadata.{f}")).collect();
    paths.push("status".into());
    paths
}

fn diff_paths(live: &DynamicObject, dry_run: &DynamicObject) -> Vec<String> {
    let ignored = ignored_paths();
    let live_value = serde_json::to_value(live).unwrap_or_default();
    let dry_run_value = serde_json::to_value(dry_run).unwrap_or_default();

    let mut out = Vec::new();
    collect_diff_paths("", &ignored, &live_value, &dry_run_value, &mut out);
    out
}

fn collect_diff_paths(path: &str, ignored: &[String], a: &serde_json::Value, b: &serde_json::Value, out: &mut Vec<String>) {
    if ignored.iter().any(|p| p == path) {
        return;
    }

    match (a, b) {
        (serde_json::Value::Object(ma), serde_json::Value::Object(mb)) => {
            let mut keys: BTreeSet<&String> = ma.keys().collect();
            keys.extend(mb.keys());
            for k in keys {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                let null = serde_json::Value::Null;
                collect_diff_paths(&child, ignored, ma.get(k).unwrap_or(&null), mb.get(k).unwrap_or(&null), out);
            }
        },
        _ => {
            if a != b {
                out.push(path.to_string());
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use kube::api::{
        ObjectMeta,
        TypeMeta,
    };
    use reconcile_core::store::MockObjectStore;
    use rstest::*;
    use serde_json::json;

    use super::*;

    fn configmap(name: &str, data: serde_json::Value) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta { api_version: "v1".into(), kind: "ConfigMap".into() }),
            metadata: ObjectMeta { namespace: Some("n".into()), name: Some(name.into()), ..Default::default() },
            data: json!({ "data": data }),
        }
    }

    fn owner() -> Owner {
        Owner::new("reconcile-apply", "example.com")
    }

    #[rstest]
    #[case::immutable_field("field is immutable")]
    #[case::rbac_role_ref("roleRef cannot be changed")]
    #[case::storage_class_parameters("updating parameters is forbidden")]
    fn test_looks_immutable(#[case] msg: &str) {
        assert!(looks_immutable(msg));
    }

    #[rstest]
    fn test_looks_immutable_false_for_unrelated_message() {
        assert!(!(looks_immutable("spec.replicas: Invalid value")));
    }

    #[tokio::test]
    async fn test_diff_created_when_absent() {
        let gvk = GVK::new("", "v1", "ConfigMap");
        let desired = configmap("c", json!({"key": "val"}));
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(|_, _, _| Ok(None));
        store
            .expect_patch()
            .times(1)
            .returning(|_, obj, _, _| Ok(obj.clone()));

        let cancel = CancellationToken::new();
        let outcome = diff_object(&store, &owner(), &gvk, &desired, &ApplyOptions::default(), &cancel).await.unwrap();
        assert_eq!(outcome, DiffOutcome::Created);
    }

    #[tokio::test]
    async fn test_diff_unchanged_when_dry_run_matches_live() {
        let gvk = GVK::new("", "v1", "ConfigMap");
        let desired = configmap("c", json!({"key": "val"}));
        let live = desired.clone();
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(move |_, _, _| Ok(Some(live.clone())));
        store
            .expect_patch()
            .times(1)
            .returning(|_, obj, _, _| Ok(obj.clone()));

        let cancel = CancellationToken::new();
        let outcome = diff_object(&store, &owner(), &gvk, &desired, &ApplyOptions::default(), &cancel).await.unwrap();
        assert_eq!(outcome, DiffOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_diff_configured_when_data_changes() {
        let gvk = GVK::new("", "v1", "ConfigMap");
        let desired = configmap("c", json!({"key": "new"}));
        let live = configmap("c", json!({"key": "old"}));
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(move |_, _, _| Ok(Some(live.clone())));
        store
            .expect_patch()
            .times(1)
            .returning(|_, obj, _, _| Ok(obj.clone()));

        let cancel = CancellationToken::new();
        let outcome = diff_object(&store, &owner(), &gvk, &desired, &ApplyOptions::default(), &cancel).await.unwrap();
        match outcome {
            DiffOutcome::Configured { diff_paths } => assert!(diff_paths.contains(&"data.data.key".to_string())),
            other => panic!("expected Configured, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_diff_needs_force_on_immutable_rejection() {
        let gvk = GVK::new("", "v1", "Secret");
        let desired = configmap("sec", json!({"key": "B"}));
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(|_, _, _| Ok(Some(desired.clone())));
        store
            .expect_patch()
            .times(1)
            .returning(|_, _, _, _| Err(StoreError::Invalid("data: Forbidden: field is immutable when `immutable` is set".into())));

        let cancel = CancellationToken::new();
        let outcome = diff_object(&store, &owner(), &gvk, &desired, &ApplyOptions::default(), &cancel).await.unwrap();
        assert_eq!(outcome, DiffOutcome::NeedsForce);
    }

    #[tokio::test]
    async fn test_diff_skipped_by_exclusion_selector() {
        let gvk = GVK::new("", "v1", "ConfigMap");
        let mut desired = configmap("c", json!({"key": "val"}));
        desired.metadata.labels = Some([("freeze".to_string(), "true".to_string())].into());

        let mut opts = ApplyOptions::default();
        opts.exclusion_selector.insert("freeze", "true");

        let store = MockObjectStore::new();
        let cancel = CancellationToken::new();
        let outcome = diff_object(&store, &owner(), &gvk, &desired, &opts, &cancel).await.unwrap();
        assert_eq!(outcome, DiffOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_diff_skipped_by_if_not_present_when_already_created() {
        let gvk = GVK::new("", "v1", "ConfigMap");
        let mut desired = configmap("c", json!({"key": "val"}));
        desired.metadata.annotations = Some([("example.com/ssa".to_string(), "IfNotPresent".to_string())].into());

        let mut opts = ApplyOptions::default();
        opts.if_not_present_selector.insert("example.com/ssa", "IfNotPresent");

        let live = desired.clone();
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(move |_, _, _| Ok(Some(live.clone())));

        let cancel = CancellationToken::new();
        let outcome = diff_object(&store, &owner(), &gvk, &desired, &opts, &cancel).await.unwrap();
        assert_eq!(outcome, DiffOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_diff_override_marker_bypasses_if_not_present() {
        let gvk = GVK::new("", "v1", "ConfigMap");
        let mut desired = configmap("c", json!({"key": "new"}));
        desired.metadata.annotations = Some(
            [
                ("example.com/ssa".to_string(), "IfNotPresent".to_string()),
            ]
            .into(),
        );
        // override marker uses the owner's own group, not the if-not-present selector's key
        desired.metadata.annotations.as_mut().unwrap().insert("example.com/ssa".into(), "Override".into());

        let mut opts = ApplyOptions::default();
        opts.if_not_present_selector.insert("example.com/ssa", "IfNotPresent");

        let live = configmap("c", json!({"key": "old"}));
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(move |_, _, _| Ok(Some(live.clone())));
        store
            .expect_patch()
            .times(1)
            .returning(|_, obj, _, _| Ok(obj.clone()));

        let cancel = CancellationToken::new();
        let outcome = diff_object(&store, &owner(), &gvk, &desired, &opts, &cancel).await.unwrap();
        match outcome {
            DiffOutcome::Configured { .. } => {},
            other => panic!("expected Configured, got {other:?}"),
        }
    }
}
