//! Append-only audit log.
//!
//! Every pipeline decision is recorded through an injected `AuditLog`.
//! Production uses the SQLite table (`SqliteAuditLog`); tests use the
//! in-memory buffer (`MemoryAuditLog`). Neither offers update or delete.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError, SharedDatabase};
use crate::models::{AuditAction, AuditEvent, Identity};

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("audit buffer lock poisoned")]
    LockPoisoned,
}

/// A single audit entry, before the store assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: Option<Identity>,
    pub action: AuditAction,
    pub detail: String,
    pub source_id: Option<Uuid>,
}

impl AuditEntry {
    pub fn new(actor: Option<Identity>, action: AuditAction, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            actor,
            action,
            detail: detail.into(),
            source_id: None,
        }
    }

    pub fn for_source(mut self, source_id: Uuid) -> Self {
        self.source_id = Some(source_id);
        self
    }
}

pub trait AuditLog: Send + Sync {
    /// Append one entry. Appends are atomic and never interleave.
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;

    /// Entries recorded for `actor`, newest first.
    fn for_actor(&self, actor: &Identity, limit: u32) -> Result<Vec<AuditEvent>, AuditError>;

    /// Entries referencing one upload, oldest first.
    fn for_source(&self, source_id: &Uuid) -> Result<Vec<AuditEvent>, AuditError>;
}

/// Audit log backed by the `audit_events` table.
pub struct SqliteAuditLog {
    db: Arc<SharedDatabase>,
}

impl SqliteAuditLog {
    pub fn new(db: Arc<SharedDatabase>) -> Self {
        Self { db }
    }
}

impl AuditLog for SqliteAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let id = self
            .db
            .with_conn(|conn| db::insert_audit_entry(conn, &entry))?;
        tracing::debug!(audit_id = id, action = %entry.action, "Audit event recorded");
        Ok(())
    }

    fn for_actor(&self, actor: &Identity, limit: u32) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self
            .db
            .with_conn(|conn| db::query_audit_by_actor(conn, actor, limit))?)
    }

    fn for_source(&self, source_id: &Uuid) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self
            .db
            .with_conn(|conn| db::query_audit_by_source(conn, source_id))?)
    }
}

/// In-process audit log. Useful for tests and for running the pipeline
/// without a database.
#[derive(Default)]
pub struct MemoryAuditLog {
    buffer: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Actions in append order.
    pub fn actions(&self) -> Vec<AuditAction> {
        self.entries().into_iter().map(|e| e.action).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn events_where(&self, keep: impl Fn(&AuditEntry) -> bool) -> Result<Vec<AuditEvent>, AuditError> {
        let buf = self.buffer.lock().map_err(|_| AuditError::LockPoisoned)?;
        Ok(buf
            .iter()
            .enumerate()
            .filter(|(_, e)| keep(e))
            .map(|(i, e)| AuditEvent {
                id: i as i64 + 1,
                actor: e.actor.clone(),
                action: e.action,
                detail: e.detail.clone(),
                source_id: e.source_id,
                created_at: e.timestamp,
            })
            .collect())
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut buf = self.buffer.lock().map_err(|_| AuditError::LockPoisoned)?;
        buf.push(entry);
        Ok(())
    }

    fn for_actor(&self, actor: &Identity, limit: u32) -> Result<Vec<AuditEvent>, AuditError> {
        let mut events = self.events_where(|e| e.actor.as_ref() == Some(actor))?;
        events.reverse();
        events.truncate(limit as usize);
        Ok(events)
    }

    fn for_source(&self, source_id: &Uuid) -> Result<Vec<AuditEvent>, AuditError> {
        self.events_where(|e| e.source_id.as_ref() == Some(source_id))
    }
}
