use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{ExtractionPayload, ExtractionRecord, Identity};

const RECORD_COLUMNS: &str = "id, source_id, owner, kind, payload, payload_digest, created_at";

/// Insert a write-once extraction record. The payload is stored as the
/// JSON text whose digest is `record.payload_digest`.
pub fn insert_extraction_record(
    conn: &Connection,
    record: &ExtractionRecord,
) -> Result<(), DatabaseError> {
    let payload_json = serde_json::to_string(&record.payload).map_err(|e| {
        DatabaseError::InvalidValue {
            field: "extraction_records.payload".into(),
            reason: e.to_string(),
        }
    })?;

    conn.execute(
        "INSERT INTO extraction_records (id, source_id, owner, kind, payload, payload_digest, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id.to_string(),
            record.source_id.to_string(),
            record.owner.as_str(),
            record.payload.kind().as_str(),
            payload_json,
            record.payload_digest,
            format_timestamp(&record.created_at),
        ],
    )?;
    Ok(())
}

/// Most recent extraction record for a source. Ties on `created_at` go to
/// the most recently inserted row.
pub fn latest_extraction_for_source(
    conn: &Connection,
    source_id: &Uuid,
) -> Result<Option<ExtractionRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM extraction_records WHERE source_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ),
            params![source_id.to_string()],
            RecordRow::from_row,
        )
        .optional()?;
    row.map(record_from_row).transpose()
}

pub fn count_extractions_for_source(
    conn: &Connection,
    source_id: &Uuid,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM extraction_records WHERE source_id = ?1",
        params![source_id.to_string()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

// Internal row type for ExtractionRecord mapping
struct RecordRow {
    id: String,
    source_id: String,
    owner: String,
    kind: String,
    payload: String,
    payload_digest: String,
    created_at: String,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_id: row.get(1)?,
            owner: row.get(2)?,
            kind: row.get(3)?,
            payload: row.get(4)?,
            payload_digest: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

fn record_from_row(row: RecordRow) -> Result<ExtractionRecord, DatabaseError> {
    let payload: ExtractionPayload =
        serde_json::from_str(&row.payload).map_err(|e| DatabaseError::InvalidValue {
            field: "extraction_records.payload".into(),
            reason: e.to_string(),
        })?;

    if payload.kind().as_str() != row.kind {
        return Err(DatabaseError::ConstraintViolation(format!(
            "extraction record {} payload kind {} does not match column kind {}",
            row.id,
            payload.kind(),
            row.kind
        )));
    }

    Ok(ExtractionRecord {
        id: parse_uuid("extraction_records.id", &row.id)?,
        source_id: parse_uuid("extraction_records.source_id", &row.source_id)?,
        owner: Identity::parse(&row.owner).map_err(|e| DatabaseError::InvalidValue {
            field: "extraction_records.owner".into(),
            reason: e.to_string(),
        })?,
        payload,
        payload_digest: row.payload_digest,
        created_at: parse_timestamp("extraction_records.created_at", &row.created_at)?,
    })
}
