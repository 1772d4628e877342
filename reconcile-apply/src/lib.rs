mod cancel;
mod changeset;
mod cleanup;
mod diff;
mod engine;
mod errors;
mod executor;
mod kube_store;
mod options;
mod selector;
mod stage;

pub use changeset::{
    Action,
    ChangeSet,
    ChangeSetEntry,
};
pub use diff::DiffOutcome;
pub use engine::{
    ApplyEngine,
    Owner,
};
pub use errors::ReconcileError;
pub use kube_store::KubeObjectStore;
pub use options::{
    ApplyOptions,
    CleanupConfig,
    FieldManagerRef,
};
pub use selector::Selector;
pub use stage::{
    partition_into_stages,
    Stage,
};
