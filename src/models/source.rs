use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::SourceKind;
use super::identity::Identity;

/// One uploaded artifact that made it through validation, scanning and
/// sanitization far enough to have stored bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub owner: Identity,
    pub kind: SourceKind,
    /// Sanitized original file name; resolves to one file under the owner's
    /// directory in the uploads area.
    pub file_name: String,
    /// Hex SHA-256 of the stored bytes after sanitization.
    pub content_digest: String,
    pub created_at: DateTime<Utc>,
}
