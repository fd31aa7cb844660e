use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(SourceKind {
    Pdf => "pdf",
    Spreadsheet => "spreadsheet",
    Image => "image",
});

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Pdf, Self::Spreadsheet, Self::Image];

    /// File extensions accepted for this declared kind (lowercase, no dot).
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["pdf"],
            Self::Spreadsheet => &["xlsx", "xls"],
            Self::Image => &["png", "jpg", "jpeg", "gif", "bmp"],
        }
    }
}

str_enum!(AuditAction {
    UploadAttempt => "upload_attempt",
    UploadStored => "upload_stored",
    UploadScanned => "upload_scanned",
    UploadBlockedMalware => "upload_blocked_malware",
    MalwareScannerUnavailable => "malware_scanner_unavailable",
    UploadSanitized => "upload_sanitized",
    SanitizationFailed => "sanitization_failed",
    UploadHashed => "upload_hashed",
    UploadExtracted => "upload_extracted",
    ExtractionDegraded => "extraction_degraded",
    UploadSuccess => "upload_success",
    UploadFailed => "upload_failed",
    UploadUndo => "upload_undo",
    FileRemovalFailed => "file_removal_failed",
});

impl AuditAction {
    /// Actions that end an upload run without producing a Source.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::UploadBlockedMalware | Self::UploadFailed)
    }

    /// Actions recording a non-fatal, reduced-assurance condition.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::MalwareScannerUnavailable
                | Self::SanitizationFailed
                | Self::ExtractionDegraded
                | Self::FileRemovalFailed
        )
    }
}
