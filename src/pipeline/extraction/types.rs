use super::ExtractionError;
use crate::models::{ExtractionPayload, SourceKind};

/// Outcome of extracting one stored file.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Complete(ExtractionPayload),
    /// Partial or empty payload. The payload's `error` field carries `reason`.
    Degraded {
        payload: ExtractionPayload,
        reason: String,
    },
}

impl Extraction {
    pub fn degraded(mut payload: ExtractionPayload, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        payload.set_error(reason.clone());
        Self::Degraded { payload, reason }
    }

    /// Degraded empty payload for `kind`, used when extraction produced
    /// nothing at all.
    pub fn empty(kind: SourceKind, reason: impl Into<String>) -> Self {
        Self::degraded(ExtractionPayload::empty(kind), reason)
    }

    pub fn payload(&self) -> &ExtractionPayload {
        match self {
            Self::Complete(payload) | Self::Degraded { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> ExtractionPayload {
        match self {
            Self::Complete(payload) | Self::Degraded { payload, .. } => payload,
        }
    }

    pub fn degradation(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Page-level PDF text source. Returns one entry per page in document
/// order; pages without text are empty strings.
pub trait PdfTextSource: Send + Sync {
    fn name(&self) -> &str;

    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Text recognition abstraction (allows running without Tesseract and
/// faking in tests).
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, ExtractionError>;
}
