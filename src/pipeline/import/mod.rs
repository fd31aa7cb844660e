pub mod hash;
pub mod staging;
pub mod validate;

pub use hash::*;
pub use staging::*;
pub use validate::*;

use thiserror::Error;

/// Why an upload was refused before anything was stored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File format incorrect. Please upload a valid {} file.", .0.to_uppercase())]
    UnsupportedKind(String),

    #[error("File format incorrect. Please upload a valid {} file.", .declared.to_uppercase())]
    ExtensionMismatch { declared: String, extension: String },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("No file uploaded")]
    MissingFile,

    #[error("Malformed upload request: {0}")]
    MalformedRequest(String),

    #[error("Caller identity is missing or invalid")]
    InvalidIdentity,
}
