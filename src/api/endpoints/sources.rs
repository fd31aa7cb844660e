//! Source endpoints: upload, list, detail, re-extract, delete.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};

use super::{blocking, parse_source_id};
use crate::api::error::ApiError;
use crate::api::types::{
    ApiContext, CallerIdentity, DeleteResponse, ReextractResponse, SourceList, UploadResponse,
    WarningBody,
};
use crate::pipeline::import::ValidationError;
use crate::pipeline::processor::{SourceDetail, UploadRequest};

/// Multipart field holding the declared kind.
const KIND_FIELD: &str = "source_type";
/// Multipart field holding the file.
const FILE_FIELD: &str = "file";
/// Kind assumed when the form omits `source_type`.
const DEFAULT_KIND: &str = "pdf";

/// `POST /api/sources` — multipart `source_type` + `file`.
///
/// The whole pipeline runs on the blocking pool; the response carries the
/// extraction payload plus any degradations the caller must know about.
/// Requests that cannot be read as an upload are still audited as rejected
/// attempts.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(CallerIdentity(identity)): Extension<CallerIdentity>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let pipeline = Arc::clone(&ctx.pipeline);
    let form = read_upload_form(multipart).await;

    let outcome = blocking(move || {
        let (declared_kind, file_name, bytes) =
            form.map_err(|e| pipeline.reject_upload(&identity, e))?;
        pipeline.ingest(UploadRequest {
            declared_kind,
            file_name,
            bytes,
            identity,
        })
    })
    .await?;
    Ok(Json(UploadResponse::from(outcome)))
}

/// Pull the declared kind and the file out of the form.
async fn read_upload_form(
    mut multipart: Multipart,
) -> Result<(String, String, Vec<u8>), ValidationError> {
    let mut declared_kind = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::MalformedRequest(e.to_string()))?
    {
        match field.name() {
            Some(KIND_FIELD) => {
                let text = field.text().await.map_err(|e| {
                    ValidationError::MalformedRequest(format!("{KIND_FIELD}: {e}"))
                })?;
                declared_kind = Some(text);
            }
            Some(FILE_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ValidationError::MalformedRequest(format!("{FILE_FIELD}: {e}"))
                })?;
                file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or(ValidationError::MissingFile)?;
    if file_name.trim().is_empty() {
        return Err(ValidationError::MissingFile);
    }
    let declared_kind = declared_kind
        .filter(|kind| !kind.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_KIND.to_string());
    Ok((declared_kind, file_name, bytes))
}

/// `GET /api/sources` — the caller's sources, newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(CallerIdentity(identity)): Extension<CallerIdentity>,
) -> Result<Json<SourceList>, ApiError> {
    let pipeline = Arc::clone(&ctx.pipeline);
    let sources = blocking(move || pipeline.list_sources(&identity)).await?;
    Ok(Json(SourceList { sources }))
}

/// `GET /api/sources/:id` — one source with its latest extraction.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(CallerIdentity(identity)): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<SourceDetail>, ApiError> {
    let source_id = parse_source_id(&id)?;
    let pipeline = Arc::clone(&ctx.pipeline);
    let detail = blocking(move || pipeline.source_detail(source_id, &identity)).await?;
    Ok(Json(detail))
}

/// `POST /api/sources/:id/extract` — run extraction again and keep the
/// new record alongside the old ones.
pub async fn reextract(
    State(ctx): State<ApiContext>,
    Extension(CallerIdentity(identity)): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<ReextractResponse>, ApiError> {
    let source_id = parse_source_id(&id)?;
    let pipeline = Arc::clone(&ctx.pipeline);
    let (record, degradation) = blocking(move || pipeline.reextract(source_id, &identity)).await?;
    Ok(Json(ReextractResponse {
        record,
        warning: degradation.map(WarningBody::from),
    }))
}

/// `DELETE /api/sources/:id` — undo an upload.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(CallerIdentity(identity)): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let source_id = parse_source_id(&id)?;
    let pipeline = Arc::clone(&ctx.pipeline);
    let outcome = blocking(move || pipeline.delete_source(source_id, &identity)).await?;
    Ok(Json(DeleteResponse {
        deleted: true,
        source_id: outcome.source_id,
        file_removed: outcome.file_removed,
        records_removed: outcome.records_removed,
    }))
}
