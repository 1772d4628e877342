use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::errors::ReconcileError;

/// Races `fut` against `cancel`, so that every network call the engine issues honors the
/// caller's cancellation signal at the point it's awaited rather than only between objects.
pub async fn guarded<T, E>(cancel: &CancellationToken, fut: impl Future<Output = Result<T, E>>) -> Result<T, ReconcileError>
where
    E: Into<ReconcileError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled("apply cancelled".into())),
        res = fut => res.map_err(Into::into),
    }
}
