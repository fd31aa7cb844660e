//! Shared types for the API layer.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{AuditEvent, ExtractionPayload, ExtractionRecord, Identity, Source, SourceKind};
use crate::pipeline::processor::{Degradation, IngestOutcome, IngestionPipeline};

/// Header carrying the authenticated caller.
pub const IDENTITY_HEADER: &str = "X-Intake-Identity";

/// Shared state for all routes.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<IngestionPipeline>,
}

impl ApiContext {
    pub fn new(pipeline: Arc<IngestionPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Authenticated caller, injected into request extensions by
/// `require_identity`.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Identity);

// ═══════════════════════════════════════════════════════════
// Response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct WarningBody {
    #[serde(flatten)]
    pub degradation: Degradation,
    pub message: String,
}

impl From<Degradation> for WarningBody {
    fn from(degradation: Degradation) -> Self {
        Self {
            message: degradation.message(),
            degradation,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub source_id: Uuid,
    pub kind: SourceKind,
    pub file_name: String,
    pub content_digest: String,
    pub data: ExtractionPayload,
    pub warnings: Vec<WarningBody>,
    /// True when extraction produced less than the full result.
    pub degraded: bool,
}

impl From<IngestOutcome> for UploadResponse {
    fn from(outcome: IngestOutcome) -> Self {
        let IngestOutcome {
            source,
            record,
            warnings,
        } = outcome;
        Self {
            source_id: source.id,
            kind: source.kind,
            file_name: source.file_name,
            content_digest: source.content_digest,
            degraded: record.payload.error().is_some(),
            data: record.payload,
            warnings: warnings.into_iter().map(WarningBody::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SourceList {
    pub sources: Vec<Source>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub source_id: Uuid,
    pub file_removed: bool,
    pub records_removed: usize,
}

#[derive(Debug, Serialize)]
pub struct ReextractResponse {
    pub record: ExtractionRecord,
    pub warning: Option<WarningBody>,
}

#[derive(Debug, Serialize)]
pub struct AuditList {
    pub events: Vec<AuditEvent>,
}
