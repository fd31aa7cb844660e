//! Route handlers.

pub mod audit;
pub mod health;
pub mod sources;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::pipeline::processor::IngestError;

/// Run pipeline work on the blocking pool. SQLite access and extraction
/// must never run on the async runtime threads.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, IngestError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {e}")))?
        .map_err(ApiError::from)
}

pub(crate) fn parse_source_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid source id".into()))
}
