use reconcile_core::errors::*;
use reconcile_core::store::StoreError;

err_impl! {ReconcileError,
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Cancelled(String),

    #[error("{0}")]
    Other(String),
}

impl From<StoreError> for ReconcileError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid(msg) | StoreError::Forbidden(msg) => ReconcileError::Invalid(msg),
            StoreError::Conflict(msg) => ReconcileError::Conflict(msg),
            StoreError::NotFound(msg) | StoreError::Timeout(msg) | StoreError::Other(msg) => ReconcileError::Other(msg),
        }
    }
}
