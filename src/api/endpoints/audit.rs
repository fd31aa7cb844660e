//! Audit trail queries. Callers only ever see their own events.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use super::{blocking, parse_source_id};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuditList, CallerIdentity};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<u32>,
}

/// `GET /api/audit?limit=N` — the caller's events, newest first.
pub async fn trail(
    State(ctx): State<ApiContext>,
    Extension(CallerIdentity(identity)): Extension<CallerIdentity>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditList>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let pipeline = Arc::clone(&ctx.pipeline);
    let events = blocking(move || pipeline.audit_trail(&identity, limit)).await?;
    Ok(Json(AuditList { events }))
}

/// `GET /api/sources/:id/audit` — the caller's events for one upload.
pub async fn for_source(
    State(ctx): State<ApiContext>,
    Extension(CallerIdentity(identity)): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<AuditList>, ApiError> {
    let source_id = parse_source_id(&id)?;
    let pipeline = Arc::clone(&ctx.pipeline);
    let events = blocking(move || pipeline.audit_for_source(source_id, &identity)).await?;
    Ok(Json(AuditList { events }))
}
