use kube::api::DynamicObject;
use kube::ResourceExt;
use reconcile_core::k8s::GVK;
use reconcile_core::object::Subject;
use reconcile_core::store::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::changeset::{
    Action,
    ChangeSet,
    ChangeSetEntry,
};
use crate::cleanup::cleanup;
use crate::diff::{
    diff_object,
    DiffOutcome,
};
use crate::errors::ReconcileError;
use crate::executor::execute;
pub use crate::options::Owner;
use crate::options::ApplyOptions;
use crate::stage::partition_into_stages;

/// The public apply surface: `Apply`/`ApplyAll`/`ApplyAllStaged` from the component design,
/// parameterized over the concrete transport so callers pay no dynamic-dispatch cost at the
/// engine boundary (the component stages underneath still talk to `&dyn ObjectStore`).
pub struct ApplyEngine<S> {
    store: S,
    owner: Owner,
}

impl<S: ObjectStore> ApplyEngine<S> {
    pub fn new(store: S, owner: Owner) -> ApplyEngine<S> {
        ApplyEngine { store, owner }
    }

    /// Single-object path: diff, execute, and clean up exactly one object.
    pub async fn apply(&self, obj: &DynamicObject, opts: &ApplyOptions, cancel: &CancellationToken) -> Result<ChangeSet, ReconcileError> {
        let mut changeset = ChangeSet::new();
        self.apply_one(obj, opts, cancel, &mut changeset).await?;
        Ok(changeset)
    }

    /// Applies `objects` as a single implicit stage, in the order given. Callers that have
    /// already resolved dependency ordering use this to skip the partitioner.
    pub async fn apply_all(&self, objects: &[DynamicObject], opts: &ApplyOptions, cancel: &CancellationToken) -> Result<ChangeSet, ReconcileError> {
        let mut changeset = ChangeSet::new();
        for obj in objects {
            self.apply_one(obj, opts, cancel, &mut changeset).await?;
        }
        Ok(changeset)
    }

    /// The canonical entry point: partitions `objects` into dependency-ordered stages and
    /// commits each stage fully (including cleanup) before the next begins.
    pub async fn apply_all_staged(
        &self,
        objects: Vec<DynamicObject>,
        opts: &ApplyOptions,
        cancel: &CancellationToken,
    ) -> Result<ChangeSet, ReconcileError> {
        let stages = partition_into_stages(objects)?;
        let mut changeset = ChangeSet::new();
        for stage in stages {
            for obj in &stage.objects {
                self.apply_one(obj, opts, cancel, &mut changeset).await?;
            }
        }
        Ok(changeset)
    }

    #[instrument(skip_all, fields(subject = tracing::field::Empty))]
    async fn apply_one(
        &self,
        obj: &DynamicObject,
        opts: &ApplyOptions,
        cancel: &CancellationToken,
        changeset: &mut ChangeSet,
    ) -> Result<(), ReconcileError> {
        let gvk = GVK::from_dynamic_obj(obj).map_err(|e| ReconcileError::Other(e.to_string()))?;
        let subject = Subject::from_dynamic_obj(obj).map_err(|e| ReconcileError::Other(e.to_string()))?;
        tracing::Span::current().record("subject", tracing::field::display(&subject));

        let outcome = diff_object(&self.store, &self.owner, &gvk, obj, opts, cancel).await?;
        let diff_summary = match &outcome {
            DiffOutcome::Configured { diff_paths } => Some(diff_paths.clone()),
            _ => None,
        };

        let action = execute(&self.store, &self.owner, &gvk, obj, outcome, opts, cancel).await?;

        if !matches!(action, Action::Skipped) {
            if let Some(cleanup_config) = &opts.cleanup {
                cleanup(&self.store, &self.owner, &gvk, obj.namespace().as_deref(), &obj.name_any(), cleanup_config, cancel).await?;
            }
        }

        changeset.push(ChangeSetEntry { subject, action, diff_summary });
        Ok(())
    }
}
