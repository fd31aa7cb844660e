use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{ExtractionRecord, Identity, Source, SourceKind};

const SOURCE_COLUMNS: &str = "id, owner, kind, file_name, content_digest, created_at";

pub fn insert_source(conn: &Connection, source: &Source) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sources (id, owner, kind, file_name, content_digest, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            source.id.to_string(),
            source.owner.as_str(),
            source.kind.as_str(),
            source.file_name,
            source.content_digest,
            format_timestamp(&source.created_at),
        ],
    )?;
    Ok(())
}

/// Fetch a source only if it belongs to `owner`. Foreign sources are
/// indistinguishable from missing ones.
pub fn get_source_for_owner(
    conn: &Connection,
    id: &Uuid,
    owner: &Identity,
) -> Result<Option<Source>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1 AND owner = ?2"),
            params![id.to_string(), owner.as_str()],
            SourceRow::from_row,
        )
        .optional()?;
    row.map(source_from_row).transpose()
}

/// All sources owned by `owner`, newest first.
pub fn list_sources_by_owner(
    conn: &Connection,
    owner: &Identity,
) -> Result<Vec<Source>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources WHERE owner = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt
        .query_map(params![owner.as_str()], SourceRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(source_from_row).collect()
}

/// How many of `owner`'s sources resolve to the same stored file name.
pub fn count_sources_with_file(
    conn: &Connection,
    owner: &Identity,
    file_name: &str,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sources WHERE owner = ?1 AND file_name = ?2",
        params![owner.as_str(), file_name],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

/// Commit a source and its first extraction record in one transaction.
/// Either both rows exist afterwards or neither does.
pub fn commit_ingestion(
    conn: &Connection,
    source: &Source,
    record: &ExtractionRecord,
) -> Result<(), DatabaseError> {
    if record.source_id != source.id || record.payload.kind() != source.kind {
        return Err(DatabaseError::ConstraintViolation(format!(
            "extraction record {} does not match source {}",
            record.id, source.id
        )));
    }

    let tx = conn.unchecked_transaction()?;
    insert_source(&tx, source)?;
    super::extraction::insert_extraction_record(&tx, record)?;
    tx.commit()?;
    Ok(())
}

/// Delete a source and every extraction record linked to it.
///
/// Children are deleted before the parent inside one transaction. Returns
/// the number of extraction records removed, or `None` when no source with
/// that id belongs to `owner`.
pub fn delete_source_cascade(
    conn: &Connection,
    id: &Uuid,
    owner: &Identity,
) -> Result<Option<usize>, DatabaseError> {
    let id_str = id.to_string();
    let tx = conn.unchecked_transaction()?;

    let owned: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM sources WHERE id = ?1 AND owner = ?2)",
        params![id_str, owner.as_str()],
        |row| row.get(0),
    )?;
    if !owned {
        return Ok(None);
    }

    let records = tx.execute(
        "DELETE FROM extraction_records WHERE source_id = ?1",
        params![id_str],
    )?;
    tx.execute("DELETE FROM sources WHERE id = ?1", params![id_str])?;
    tx.commit()?;

    tracing::debug!(source_id = %id, records, "Source cascade-deleted");
    Ok(Some(records))
}

// Internal row type for Source mapping
struct SourceRow {
    id: String,
    owner: String,
    kind: String,
    file_name: String,
    content_digest: String,
    created_at: String,
}

impl SourceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            kind: row.get(2)?,
            file_name: row.get(3)?,
            content_digest: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

fn source_from_row(row: SourceRow) -> Result<Source, DatabaseError> {
    Ok(Source {
        id: parse_uuid("sources.id", &row.id)?,
        owner: Identity::parse(&row.owner).map_err(|e| DatabaseError::InvalidValue {
            field: "sources.owner".into(),
            reason: e.to_string(),
        })?,
        kind: SourceKind::from_str(&row.kind)?,
        file_name: row.file_name,
        content_digest: row.content_digest,
        created_at: parse_timestamp("sources.created_at", &row.created_at)?,
    })
}
