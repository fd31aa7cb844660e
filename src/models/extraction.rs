use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::enums::SourceKind;
use super::identity::Identity;

/// Write-once result of running extraction against a Source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub id: Uuid,
    pub source_id: Uuid,
    pub owner: Identity,
    pub payload: ExtractionPayload,
    /// Hex SHA-256 of the serialized payload as stored.
    pub payload_digest: String,
    pub created_at: DateTime<Utc>,
}

/// Normalized extraction output. The `kind` tag and the per-kind shapes are
/// the wire contract consumed by downstream readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionPayload {
    Pdf(PdfContent),
    Spreadsheet(SpreadsheetContent),
    Image(ImageContent),
}

impl ExtractionPayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Pdf(_) => SourceKind::Pdf,
            Self::Spreadsheet(_) => SourceKind::Spreadsheet,
            Self::Image(_) => SourceKind::Image,
        }
    }

    /// Empty payload of the given kind, used when nothing could be extracted.
    pub fn empty(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Pdf => Self::Pdf(PdfContent::from_pages(Vec::new())),
            SourceKind::Spreadsheet => Self::Spreadsheet(SpreadsheetContent::default()),
            SourceKind::Image => Self::Image(ImageContent::default()),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Pdf(c) => c.error.as_deref(),
            Self::Spreadsheet(c) => c.error.as_deref(),
            Self::Image(c) => c.error.as_deref(),
        }
    }

    pub fn set_error(&mut self, reason: impl Into<String>) {
        let reason = Some(reason.into());
        match self {
            Self::Pdf(c) => c.error = reason,
            Self::Spreadsheet(c) => c.error = reason,
            Self::Image(c) => c.error = reason,
        }
    }
}

// ── PDF ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfContent {
    /// Number of pages that yielded text.
    pub page_count: usize,
    pub pages: Vec<PdfPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PdfContent {
    pub fn from_pages(pages: Vec<PdfPage>) -> Self {
        Self {
            page_count: pages.len(),
            pages,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfPage {
    /// 1-based page number in the source document.
    pub page: u32,
    pub text: String,
}

// ── Spreadsheet ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetContent {
    pub sheets: Sheets,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

/// Sheet name → sheet, in workbook order. Serialized as a JSON object whose
/// key order follows the workbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheets(Vec<(String, Sheet)>);

impl Sheets {
    pub fn push(&mut self, name: impl Into<String>, sheet: Sheet) {
        self.0.push((name.into(), sheet));
    }

    pub fn get(&self, name: &str) -> Option<&Sheet> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sheet)> {
        self.0.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Sheets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, sheet)| (name, sheet)))
    }
}

impl<'de> Deserialize<'de> for Sheets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SheetsVisitor;

        impl<'de> Visitor<'de> for SheetsVisitor {
            type Value = Sheets;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of sheet name to sheet")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Sheets, A::Error> {
                let mut sheets = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, sheet)) = map.next_entry::<String, Sheet>()? {
                    sheets.push((name, sheet));
                }
                Ok(Sheets(sheets))
            }
        }

        deserializer.deserialize_map(SheetsVisitor)
    }
}

// ── Image ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// Recognized text; absent when recognition was unavailable or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// PIL-style mode name ("RGB", "RGBA", "L", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<String>,
    /// Encoded format ("PNG", "JPEG", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
