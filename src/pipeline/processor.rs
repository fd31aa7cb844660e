//! Ingestion pipeline.
//!
//! One sequential run per upload:
//! validate → store → scan → sanitize → hash → extract → persist.
//! Every stage transition emits exactly one audit event, and every run ends
//! with exactly one terminal event. Only three conditions stop a run: a
//! rejected upload, confirmed malware, and a storage failure. Everything
//! else degrades and is reported back as a `Degradation`.
//!
//! Engines (audit log, scanner, sanitizer, extractors) are injected, so the
//! pipeline is fully testable with fakes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditError, AuditLog, SqliteAuditLog};
use crate::db::{self, DatabaseError, SharedDatabase};
use crate::models::{
    AuditAction, AuditEvent, ExtractionPayload, ExtractionRecord, Identity, Source, SourceKind,
};
use crate::pipeline::deadline::{run_with_deadline, StageOutcome};
use crate::pipeline::extraction::{Extraction, ExtractionDispatcher};
use crate::pipeline::import::{
    check_size, hash_bytes, hash_file, place_staged, remove_stored, sanitize_filename,
    stage_upload, stored_path, validate_upload, ValidationError,
};
use crate::pipeline::security::{
    ContentSanitizer, MalwareScanner, NullScanner, Sanitizer, ScanReport, ScanVerdict,
};

// ---------------------------------------------------------------------------
// Error and result types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Upload blocked: malware detected ({detail})")]
    SecurityAbort { detail: String },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Source not found: {0}")]
    NotFound(Uuid),
}

impl From<DatabaseError> for IngestError {
    fn from(e: DatabaseError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<AuditError> for IngestError {
    fn from(e: AuditError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// A non-fatal, reduced-assurance condition the caller must be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    ScannerUnavailable { detail: String },
    SanitizationFailed { detail: String },
    ExtractionDegraded { reason: String },
}

impl Degradation {
    /// Short human-readable form for API responses.
    pub fn message(&self) -> String {
        match self {
            Self::ScannerUnavailable { detail } => {
                format!("File was not scanned for malware: {detail}")
            }
            Self::SanitizationFailed { detail } => {
                format!("Active content could not be removed: {detail}")
            }
            Self::ExtractionDegraded { reason } => format!("Extraction incomplete: {reason}"),
        }
    }
}

/// One upload as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub declared_kind: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub identity: Identity,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub source: Source,
    pub record: ExtractionRecord,
    pub warnings: Vec<Degradation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub source_id: Uuid,
    /// False when the file was already gone, shared with another source,
    /// or could not be removed.
    pub file_removed: bool,
    pub records_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceDetail {
    pub source: Source,
    pub latest: Option<ExtractionRecord>,
    pub extraction_count: i64,
}

// ---------------------------------------------------------------------------
// Stage tracking
// ---------------------------------------------------------------------------

/// Pipeline stages in execution order. Runs only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    TypeValidated,
    Stored,
    Scanned,
    Sanitized,
    Hashed,
    Extracted,
    Persisted,
}

/// Bookkeeping for one ingestion run: current stage plus the audit trail it
/// has emitted so far.
struct PipelineRun<'a> {
    upload_id: Uuid,
    actor: Identity,
    stage: PipelineStage,
    terminated: bool,
    audit: &'a dyn AuditLog,
}

impl<'a> PipelineRun<'a> {
    fn start(audit: &'a dyn AuditLog, actor: Identity) -> Self {
        Self {
            upload_id: Uuid::new_v4(),
            actor,
            stage: PipelineStage::Received,
            terminated: false,
            audit,
        }
    }

    /// Move to `next` and record the transition.
    fn advance(&mut self, next: PipelineStage, action: AuditAction, detail: impl Into<String>) {
        debug_assert!(next > self.stage, "backward transition {:?} -> {:?}", self.stage, next);
        debug_assert!(!self.terminated, "transition after terminal event");
        tracing::debug!(upload_id = %self.upload_id, stage = ?next, action = %action, "Stage complete");
        self.stage = next;
        if next == PipelineStage::Persisted || action.is_abort() {
            self.terminated = true;
        }
        self.record(action, detail);
    }

    /// Record the terminal event of a run that stops without advancing.
    fn terminate(&mut self, action: AuditAction, detail: impl Into<String>) {
        debug_assert!(!self.terminated, "second terminal event");
        self.terminated = true;
        tracing::debug!(upload_id = %self.upload_id, stage = ?self.stage, action = %action, "Run terminated");
        self.record(action, detail);
    }

    /// Append an audit entry. A failing audit store is logged, not fatal.
    fn record(&self, action: AuditAction, detail: impl Into<String>) {
        if action.is_warning() {
            tracing::warn!(upload_id = %self.upload_id, action = %action, "Run degraded");
        }
        let entry = AuditEntry::new(Some(self.actor.clone()), action, detail)
            .for_source(self.upload_id);
        if let Err(e) = self.audit.append(entry) {
            tracing::error!(upload_id = %self.upload_id, action = %action, error = %e, "Audit append failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    pub scan_timeout: Duration,
    pub extraction_timeout: Duration,
    pub max_upload_bytes: u64,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(60),
            extraction_timeout: Duration::from_secs(120),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

pub struct IngestionPipeline {
    db: Arc<SharedDatabase>,
    uploads_root: PathBuf,
    audit: Arc<dyn AuditLog>,
    scanner: Arc<dyn MalwareScanner>,
    sanitizer: Arc<dyn Sanitizer>,
    dispatcher: Arc<ExtractionDispatcher>,
    limits: PipelineLimits,
}

impl IngestionPipeline {
    /// Pipeline with the shipped engines: SQLite audit log, no malware
    /// scanner, the content sanitizer, and extraction without OCR.
    pub fn new(db: Arc<SharedDatabase>, uploads_root: impl Into<PathBuf>) -> Self {
        Self {
            audit: Arc::new(SqliteAuditLog::new(Arc::clone(&db))),
            db,
            uploads_root: uploads_root.into(),
            scanner: Arc::new(NullScanner),
            sanitizer: Arc::new(ContentSanitizer),
            dispatcher: Arc::new(ExtractionDispatcher::with_ocr(None)),
            limits: PipelineLimits::default(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn MalwareScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: ExtractionDispatcher) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    pub fn with_limits(mut self, limits: PipelineLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> PipelineLimits {
        self.limits
    }

    pub fn scanner_name(&self) -> &str {
        self.scanner.name()
    }

    /// Record an upload that never reached validation, such as a request
    /// without a file, as a rejected attempt. Returns the error to report.
    pub fn reject_upload(&self, identity: &Identity, error: ValidationError) -> IngestError {
        let mut run = PipelineRun::start(self.audit.as_ref(), identity.clone());
        run.terminate(AuditAction::UploadAttempt, format!("rejected: {error}"));
        tracing::info!(upload_id = %run.upload_id, "Upload rejected before validation");
        IngestError::Validation(error)
    }

    /// Run one upload through every stage.
    ///
    /// The bytes stay in a private staged file until the run commits, so an
    /// aborted upload never replaces a file an earlier source points at.
    pub fn ingest(&self, request: UploadRequest) -> Result<IngestOutcome, IngestError> {
        let UploadRequest {
            declared_kind,
            file_name,
            bytes,
            identity,
        } = request;
        let mut run = PipelineRun::start(self.audit.as_ref(), identity.clone());
        let mut warnings = Vec::new();

        // Received → TypeValidated
        let file_name = sanitize_filename(&file_name);
        let validated = validate_upload(&declared_kind, &file_name)
            .and_then(|kind| check_size(bytes.len() as u64, self.limits.max_upload_bytes).map(|_| kind));
        let kind = match validated {
            Ok(kind) => {
                run.advance(
                    PipelineStage::TypeValidated,
                    AuditAction::UploadAttempt,
                    format!("{file_name}: accepted as {kind}"),
                );
                kind
            }
            Err(e) => {
                run.terminate(AuditAction::UploadAttempt, format!("{file_name}: rejected: {e}"));
                tracing::info!(upload_id = %run.upload_id, "Upload rejected at validation");
                return Err(e.into());
            }
        };

        // TypeValidated → Stored
        let staged = match stage_upload(&self.uploads_root, &identity, &bytes) {
            Ok(staged) => staged,
            Err(e) => return Err(self.fail_storage(&mut run, None, format!("write failed: {e}"))),
        };
        run.advance(
            PipelineStage::Stored,
            AuditAction::UploadStored,
            format!("{} bytes staged", bytes.len()),
        );
        drop(bytes);

        // Stored → Scanned
        let report = self.scan(staged.path());
        match report.verdict {
            ScanVerdict::Clean => run.advance(
                PipelineStage::Scanned,
                AuditAction::UploadScanned,
                format!("{}: {}", self.scanner.name(), report.detail),
            ),
            ScanVerdict::Unavailable => {
                run.advance(
                    PipelineStage::Scanned,
                    AuditAction::MalwareScannerUnavailable,
                    report.detail.clone(),
                );
                warnings.push(Degradation::ScannerUnavailable {
                    detail: report.detail,
                });
            }
            ScanVerdict::Infected => {
                self.discard(&run, staged);
                run.advance(
                    PipelineStage::Scanned,
                    AuditAction::UploadBlockedMalware,
                    format!("{file_name}: {}", report.detail),
                );
                tracing::warn!(upload_id = %run.upload_id, "Upload blocked: malware detected");
                return Err(IngestError::SecurityAbort {
                    detail: report.detail,
                });
            }
        }

        // Scanned → Sanitized
        let sanitized = self.sanitizer.sanitize(staged.path(), kind);
        if sanitized.success {
            run.advance(
                PipelineStage::Sanitized,
                AuditAction::UploadSanitized,
                sanitized.detail,
            );
        } else {
            run.advance(
                PipelineStage::Sanitized,
                AuditAction::SanitizationFailed,
                sanitized.detail.clone(),
            );
            warnings.push(Degradation::SanitizationFailed {
                detail: sanitized.detail,
            });
        }
        let working = sanitized.path;

        // Sanitized → Hashed
        let content_digest = match hash_file(&working) {
            Ok(digest) => digest,
            Err(e) => {
                return Err(self.fail_storage(&mut run, Some(staged), format!("hash failed: {e}")))
            }
        };
        run.advance(
            PipelineStage::Hashed,
            AuditAction::UploadHashed,
            content_digest.clone(),
        );

        // Hashed → Extracted
        let extraction = self.extract(&working, kind);
        match extraction.degradation() {
            None => run.advance(
                PipelineStage::Extracted,
                AuditAction::UploadExtracted,
                summarize(extraction.payload()),
            ),
            Some(reason) => {
                run.advance(
                    PipelineStage::Extracted,
                    AuditAction::ExtractionDegraded,
                    reason.to_string(),
                );
                warnings.push(Degradation::ExtractionDegraded {
                    reason: reason.to_string(),
                });
            }
        }

        // Extracted → Persisted
        let now = Utc::now();
        let source = Source {
            id: run.upload_id,
            owner: identity.clone(),
            kind,
            file_name,
            content_digest,
            created_at: now,
        };
        let record = match build_record(&source, extraction.into_payload()) {
            Ok(record) => record,
            Err(reason) => return Err(self.fail_storage(&mut run, Some(staged), reason)),
        };
        // Rows and file name change together under the database lock. A
        // failed commit drops the staged file; a failed rename undoes the rows.
        let target = stored_path(&self.uploads_root, &identity, &source.file_name);
        let committed = self.db.with_conn(|conn| {
            db::commit_ingestion(conn, &source, &record)?;
            if let Err(e) = place_staged(staged, &target) {
                db::delete_source_cascade(conn, &source.id, &identity)?;
                return Ok(Err(e));
            }
            Ok(Ok(()))
        });
        match committed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(self.fail_storage(&mut run, None, format!("placing file failed: {e}")))
            }
            Err(e) => return Err(self.fail_storage(&mut run, None, format!("commit failed: {e}"))),
        }
        run.advance(
            PipelineStage::Persisted,
            AuditAction::UploadSuccess,
            format!("{}: stored as {kind}", source.file_name),
        );

        tracing::info!(
            source_id = %source.id,
            kind = %kind,
            warnings = warnings.len(),
            "Upload ingested"
        );
        Ok(IngestOutcome {
            source,
            record,
            warnings,
        })
    }

    /// Undo an upload: audit, remove the stored file, then delete the
    /// source and its extraction records.
    pub fn delete_source(
        &self,
        source_id: Uuid,
        identity: &Identity,
    ) -> Result<DeleteOutcome, IngestError> {
        let source = self
            .db
            .with_conn(|conn| db::get_source_for_owner(conn, &source_id, identity))?
            .ok_or(IngestError::NotFound(source_id))?;

        self.record(
            identity,
            AuditAction::UploadUndo,
            format!("{}: deleted by owner", source.file_name),
            source.id,
        );

        // Sharer count, file removal and row deletion form one critical
        // section, so concurrent deletes of sources sharing a file agree on
        // who removes it.
        let path = stored_path(&self.uploads_root, identity, &source.file_name);
        let (removal, records_removed) = self.db.with_conn(|conn| {
            let sharers = db::count_sources_with_file(conn, identity, &source.file_name)?;
            let removal = if sharers > 1 {
                tracing::debug!(source_id = %source.id, sharers, "Stored file shared, keeping it");
                Ok(false)
            } else {
                remove_stored(&path)
            };
            let records = db::delete_source_cascade(conn, &source_id, identity)?;
            Ok((removal, records))
        })?;

        let file_removed = match removal {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(source_id = %source.id, error = %e, "Stored file removal failed");
                self.record(
                    identity,
                    AuditAction::FileRemovalFailed,
                    format!("{}: {e}", source.file_name),
                    source.id,
                );
                false
            }
        };
        let records_removed = records_removed.ok_or(IngestError::NotFound(source_id))?;

        tracing::info!(source_id = %source_id, records_removed, file_removed, "Source deleted");
        Ok(DeleteOutcome {
            source_id,
            file_removed,
            records_removed,
        })
    }

    /// Run extraction again over a stored source and append a new record.
    /// Earlier records are kept; reads return the newest.
    pub fn reextract(
        &self,
        source_id: Uuid,
        identity: &Identity,
    ) -> Result<(ExtractionRecord, Option<Degradation>), IngestError> {
        let source = self
            .db
            .with_conn(|conn| db::get_source_for_owner(conn, &source_id, identity))?
            .ok_or(IngestError::NotFound(source_id))?;

        let path = stored_path(&self.uploads_root, identity, &source.file_name);
        let extraction = self.extract(&path, source.kind);
        let degradation = match extraction.degradation() {
            None => {
                self.record(
                    identity,
                    AuditAction::UploadExtracted,
                    summarize(extraction.payload()),
                    source.id,
                );
                None
            }
            Some(reason) => {
                self.record(identity, AuditAction::ExtractionDegraded, reason, source.id);
                Some(Degradation::ExtractionDegraded {
                    reason: reason.to_string(),
                })
            }
        };

        let record = build_record(&source, extraction.into_payload()).map_err(IngestError::Storage)?;
        self.db
            .with_conn(|conn| db::insert_extraction_record(conn, &record))?;

        tracing::info!(source_id = %source.id, record_id = %record.id, "Source re-extracted");
        Ok((record, degradation))
    }

    /// The identity's sources, newest first.
    pub fn list_sources(&self, identity: &Identity) -> Result<Vec<Source>, IngestError> {
        Ok(self
            .db
            .with_conn(|conn| db::list_sources_by_owner(conn, identity))?)
    }

    /// One source with its most recent extraction record.
    pub fn source_detail(
        &self,
        source_id: Uuid,
        identity: &Identity,
    ) -> Result<SourceDetail, IngestError> {
        self.db
            .with_conn(|conn| {
                let Some(source) = db::get_source_for_owner(conn, &source_id, identity)? else {
                    return Ok(None);
                };
                let latest = db::latest_extraction_for_source(conn, &source_id)?;
                let extraction_count = db::count_extractions_for_source(conn, &source_id)?;
                Ok(Some(SourceDetail {
                    source,
                    latest,
                    extraction_count,
                }))
            })?
            .ok_or(IngestError::NotFound(source_id))
    }

    /// The identity's audit trail, newest first.
    pub fn audit_trail(&self, identity: &Identity, limit: u32) -> Result<Vec<AuditEvent>, IngestError> {
        Ok(self.audit.for_actor(identity, limit)?)
    }

    /// Audit events for one upload, newest first. Only the identity's own
    /// events are returned.
    pub fn audit_for_source(
        &self,
        source_id: Uuid,
        identity: &Identity,
    ) -> Result<Vec<AuditEvent>, IngestError> {
        let mut events: Vec<AuditEvent> = self
            .audit
            .for_source(&source_id)?
            .into_iter()
            .filter(|e| e.actor.as_ref() == Some(identity))
            .collect();
        events.reverse();
        Ok(events)
    }

    // -- stage helpers ------------------------------------------------------

    fn scan(&self, path: &Path) -> ScanReport {
        let scanner = Arc::clone(&self.scanner);
        let path = path.to_path_buf();
        let limit = self.limits.scan_timeout;
        match run_with_deadline("scan", limit, move || scanner.scan(&path)) {
            StageOutcome::Finished(report) => report,
            StageOutcome::TimedOut => {
                ScanReport::unavailable(format!("scan did not finish within {}s", limit.as_secs()))
            }
            StageOutcome::WorkerFailed => ScanReport::unavailable("scanner crashed"),
        }
    }

    fn extract(&self, path: &Path, kind: SourceKind) -> Extraction {
        let dispatcher = Arc::clone(&self.dispatcher);
        let path = path.to_path_buf();
        match run_with_deadline("extract", self.limits.extraction_timeout, move || {
            dispatcher.extract(&path, kind)
        }) {
            StageOutcome::Finished(extraction) => extraction,
            StageOutcome::TimedOut => Extraction::empty(kind, "extraction timed out"),
            StageOutcome::WorkerFailed => Extraction::empty(kind, "extractor crashed"),
        }
    }

    /// Drop a staged upload that must not survive the run.
    fn discard(&self, run: &PipelineRun<'_>, staged: NamedTempFile) {
        if let Err(e) = staged.close() {
            tracing::warn!(upload_id = %run.upload_id, error = %e, "Stored file removal failed");
            run.record(AuditAction::FileRemovalFailed, e.to_string());
        }
    }

    /// End the run on a storage failure: drop the staged file, record the
    /// terminal event, and build the error for the caller.
    fn fail_storage(
        &self,
        run: &mut PipelineRun<'_>,
        staged: Option<NamedTempFile>,
        reason: String,
    ) -> IngestError {
        if let Some(staged) = staged {
            self.discard(run, staged);
        }
        tracing::error!(upload_id = %run.upload_id, stage = ?run.stage, reason = %reason, "Upload failed");
        run.terminate(AuditAction::UploadFailed, reason.clone());
        IngestError::Storage(reason)
    }

    fn record(&self, actor: &Identity, action: AuditAction, detail: impl Into<String>, source_id: Uuid) {
        let entry = AuditEntry::new(Some(actor.clone()), action, detail).for_source(source_id);
        if let Err(e) = self.audit.append(entry) {
            tracing::error!(source_id = %source_id, action = %action, error = %e, "Audit append failed");
        }
    }
}

/// Wrap a payload in a record for `source`, digesting the exact JSON that
/// will be stored.
fn build_record(source: &Source, payload: ExtractionPayload) -> Result<ExtractionRecord, String> {
    let json = serde_json::to_string(&payload).map_err(|e| format!("payload encoding failed: {e}"))?;
    Ok(ExtractionRecord {
        id: Uuid::new_v4(),
        source_id: source.id,
        owner: source.owner.clone(),
        payload_digest: hash_bytes(json.as_bytes()),
        payload,
        created_at: Utc::now(),
    })
}

/// Audit summary of a payload. Counts and dimensions only, never content.
fn summarize(payload: &ExtractionPayload) -> String {
    match payload {
        ExtractionPayload::Pdf(content) => format!("pdf: {} pages with text", content.page_count),
        ExtractionPayload::Spreadsheet(content) => {
            let rows: usize = content.sheets.iter().map(|(_, s)| s.row_count).sum();
            format!("spreadsheet: {} sheets, {rows} rows", content.sheets.len())
        }
        ExtractionPayload::Image(content) => match (content.width, content.height) {
            (Some(w), Some(h)) => format!("image: {w}x{h}"),
            _ => "image".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
