use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::audit::AuditEntry;
use crate::db::DatabaseError;
use crate::models::{AuditAction, AuditEvent, Identity};

/// Append one entry to the audit_events table. There is deliberately no
/// update or delete counterpart; the schema rejects both.
pub fn insert_audit_entry(conn: &Connection, entry: &AuditEntry) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_events (actor, action, detail, source_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.actor.as_ref().map(|a| a.as_str().to_string()),
            entry.action.as_str(),
            entry.detail,
            entry.source_id.map(|id| id.to_string()),
            format_timestamp(&entry.timestamp),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Audit events for one actor, newest first.
pub fn query_audit_by_actor(
    conn: &Connection,
    actor: &Identity,
    limit: u32,
) -> Result<Vec<AuditEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, actor, action, detail, source_id, created_at FROM audit_events
         WHERE actor = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![actor.as_str(), limit], AuditRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(event_from_row).collect()
}

/// Audit events that reference an upload, oldest first.
pub fn query_audit_by_source(
    conn: &Connection,
    source_id: &Uuid,
) -> Result<Vec<AuditEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, actor, action, detail, source_id, created_at FROM audit_events
         WHERE source_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![source_id.to_string()], AuditRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(event_from_row).collect()
}

pub fn count_audit_events(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM audit_events", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

struct AuditRow {
    id: i64,
    actor: Option<String>,
    action: String,
    detail: String,
    source_id: Option<String>,
    created_at: String,
}

impl AuditRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            actor: row.get(1)?,
            action: row.get(2)?,
            detail: row.get(3)?,
            source_id: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

fn event_from_row(row: AuditRow) -> Result<AuditEvent, DatabaseError> {
    let actor = row
        .actor
        .map(|a| {
            Identity::parse(&a).map_err(|e| DatabaseError::InvalidValue {
                field: "audit_events.actor".into(),
                reason: e.to_string(),
            })
        })
        .transpose()?;

    Ok(AuditEvent {
        id: row.id,
        actor,
        action: AuditAction::from_str(&row.action)?,
        detail: row.detail,
        source_id: row
            .source_id
            .map(|s| parse_uuid("audit_events.source_id", &s))
            .transpose()?,
        created_at: parse_timestamp("audit_events.created_at", &row.created_at)?,
    })
}
