use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AuditAction;
use super::identity::Identity;

/// A persisted, immutable audit log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    /// `None` for system-initiated events.
    pub actor: Option<Identity>,
    pub action: AuditAction,
    pub detail: String,
    /// Upload the event describes; may reference a Source that was never
    /// created (aborted run) or has since been deleted.
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
