use kube::api::DynamicObject;
use kube::ResourceExt;
use reconcile_core::constants::FINALIZER_POLL_INTERVAL_SECONDS;
use reconcile_core::k8s::GVK;
use reconcile_core::object::Subject;
use reconcile_core::store::{
    ApplyMode,
    ObjectStore,
    PropagationPolicy,
};
use tokio::time::{
    sleep,
    Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{
    debug,
    info,
};

use crate::cancel::guarded;
use crate::changeset::Action;
use crate::diff::DiffOutcome;
use crate::errors::ReconcileError;
use crate::options::{
    ApplyOptions,
    Owner,
};

/// Commits the minimum write implied by `outcome`, including the forced delete+recreate
/// protocol when the diff rejected an immutable field and the object is force-eligible.
pub async fn execute(
    store: &dyn ObjectStore,
    owner: &Owner,
    gvk: &GVK,
    obj: &DynamicObject,
    outcome: DiffOutcome,
    opts: &ApplyOptions,
    cancel: &CancellationToken,
) -> Result<Action, ReconcileError> {
    match outcome {
        DiffOutcome::Unchanged => Ok(Action::Unchanged),
        DiffOutcome::Skipped => Ok(Action::Skipped),
        DiffOutcome::Created => {
            guarded(cancel, store.patch(gvk, obj, &owner.field_manager_name, ApplyMode::Commit)).await?;
            Ok(Action::Created)
        },
        DiffOutcome::Configured { .. } => {
            guarded(cancel, store.patch(gvk, obj, &owner.field_manager_name, ApplyMode::Commit)).await?;
            Ok(Action::Configured)
        },
        DiffOutcome::NeedsForce => {
            if opts.force_eligible(obj) {
                force_recreate(store, owner, gvk, obj, cancel).await?;
                Ok(Action::Created)
            } else {
                let subject = Subject::from_dynamic_obj(obj).map_err(|e| ReconcileError::Other(e.to_string()))?;
                Err(ReconcileError::Invalid(format!(
                    "{subject} requires forced re-creation to apply but force is not permitted"
                )))
            }
        },
    }
}

async fn force_recreate(
    store: &dyn ObjectStore,
    owner: &Owner,
    gvk: &GVK,
    obj: &DynamicObject,
    cancel: &CancellationToken,
) -> Result<(), ReconcileError> {
    let namespace = obj.namespace();
    let name = obj.name_any();
    let subject = Subject::from_dynamic_obj(obj).map_err(|e| ReconcileError::Other(e.to_string()))?;

    info!(%subject, "deleting for forced re-creation");
    guarded(cancel, store.delete(gvk, namespace.clone(), name.clone(), PropagationPolicy::Foreground)).await?;

    wait_for_deletion(store, gvk, namespace, name, cancel).await?;

    info!(%subject, "re-creating after forced deletion");
    guarded(cancel, store.patch(gvk, obj, &owner.field_manager_name, ApplyMode::Commit)).await?;
    Ok(())
}

// Polls until the object is gone. Finalizers may hold it open arbitrarily long; there is no
// internal timeout, only the caller's cancellation token.
async fn wait_for_deletion(
    store: &dyn ObjectStore,
    gvk: &GVK,
    namespace: Option<String>,
    name: String,
    cancel: &CancellationToken,
) -> Result<(), ReconcileError> {
    loop {
        let current = guarded(cancel, store.get(gvk, namespace.clone(), name.clone())).await?;
        if current.is_none() {
            return Ok(());
        }

        debug!(name, "waiting for finalizer-driven deletion");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReconcileError::Cancelled("apply cancelled".into())),
            _ = sleep(Duration::from_secs(FINALIZER_POLL_INTERVAL_SECONDS)) => {},
        }
    }
}
