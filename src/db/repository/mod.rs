//! Repository layer: owner-scoped operations over sources, extraction
//! records and the audit table. All functions take a borrowed connection so
//! callers decide the locking and transaction scope.

mod audit;
mod extraction;
mod source;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use super::DatabaseError;

pub use audit::*;
pub use extraction::*;
pub use source::*;

/// Fixed-width RFC 3339 so that text ordering in SQL matches time ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidValue {
            field: field.into(),
            reason: e.to_string(),
        })
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::InvalidValue {
        field: field.into(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEntry;
    use crate::db::sqlite::open_memory_database;
    use crate::models::*;
    use chrono::Duration;
    use rusqlite::Connection;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn owner(name: &str) -> Identity {
        Identity::parse(name).unwrap()
    }

    fn make_source(owner: &Identity, kind: SourceKind, file_name: &str) -> Source {
        Source {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            kind,
            file_name: file_name.into(),
            content_digest: "ab".repeat(32),
            created_at: Utc::now(),
        }
    }

    fn make_record(source: &Source, text: &str) -> ExtractionRecord {
        ExtractionRecord {
            id: Uuid::new_v4(),
            source_id: source.id,
            owner: source.owner.clone(),
            payload: ExtractionPayload::Pdf(PdfContent::from_pages(vec![PdfPage {
                page: 1,
                text: text.into(),
            }])),
            payload_digest: "cd".repeat(32),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn commit_and_fetch_source_with_record() {
        let conn = test_db();
        let alice = owner("alice");
        let source = make_source(&alice, SourceKind::Pdf, "report.pdf");
        let record = make_record(&source, "hello");

        commit_ingestion(&conn, &source, &record).unwrap();

        let fetched = get_source_for_owner(&conn, &source.id, &alice).unwrap().unwrap();
        assert_eq!(fetched.file_name, "report.pdf");
        assert_eq!(fetched.kind, SourceKind::Pdf);
        assert_eq!(fetched.content_digest, source.content_digest);

        let latest = latest_extraction_for_source(&conn, &source.id).unwrap().unwrap();
        assert_eq!(latest.id, record.id);
        assert_eq!(latest.payload, record.payload);
    }

    #[test]
    fn foreign_owner_cannot_see_source() {
        let conn = test_db();
        let alice = owner("alice");
        let source = make_source(&alice, SourceKind::Pdf, "a.pdf");
        commit_ingestion(&conn, &source, &make_record(&source, "x")).unwrap();

        let bob = owner("bob");
        assert!(get_source_for_owner(&conn, &source.id, &bob).unwrap().is_none());
        assert!(list_sources_by_owner(&conn, &bob).unwrap().is_empty());
        assert_eq!(delete_source_cascade(&conn, &source.id, &bob).unwrap(), None);
        assert!(get_source_for_owner(&conn, &source.id, &alice).unwrap().is_some());
    }

    #[test]
    fn commit_rejects_kind_mismatch_and_leaves_nothing() {
        let conn = test_db();
        let alice = owner("alice");
        let source = make_source(&alice, SourceKind::Image, "a.png");
        let record = make_record(&source, "pdf payload on an image");

        let err = commit_ingestion(&conn, &source, &record).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert!(list_sources_by_owner(&conn, &alice).unwrap().is_empty());
    }

    #[test]
    fn failed_record_insert_rolls_back_source() {
        let conn = test_db();
        let alice = owner("alice");
        let first = make_source(&alice, SourceKind::Pdf, "a.pdf");
        let record = make_record(&first, "x");
        commit_ingestion(&conn, &first, &record).unwrap();

        // Reusing the record id violates the primary key after the source row
        // has been written inside the transaction.
        let second = make_source(&alice, SourceKind::Pdf, "b.pdf");
        let mut dup = make_record(&second, "y");
        dup.id = record.id;
        assert!(commit_ingestion(&conn, &second, &dup).is_err());

        let listed = list_sources_by_owner(&conn, &alice).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first.id);
    }

    #[test]
    fn list_is_newest_first() {
        let conn = test_db();
        let alice = owner("alice");
        let mut older = make_source(&alice, SourceKind::Pdf, "old.pdf");
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = make_source(&alice, SourceKind::Pdf, "new.pdf");
        commit_ingestion(&conn, &older, &make_record(&older, "o")).unwrap();
        commit_ingestion(&conn, &newer, &make_record(&newer, "n")).unwrap();

        let names: Vec<String> = list_sources_by_owner(&conn, &alice)
            .unwrap()
            .into_iter()
            .map(|s| s.file_name)
            .collect();
        assert_eq!(names, ["new.pdf", "old.pdf"]);
    }

    #[test]
    fn latest_extraction_prefers_most_recent() {
        let conn = test_db();
        let alice = owner("alice");
        let source = make_source(&alice, SourceKind::Pdf, "a.pdf");
        let first = make_record(&source, "first pass");
        commit_ingestion(&conn, &source, &first).unwrap();

        let mut second = make_record(&source, "second pass");
        second.created_at = first.created_at + Duration::seconds(1);
        insert_extraction_record(&conn, &second).unwrap();

        let latest = latest_extraction_for_source(&conn, &source.id).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(count_extractions_for_source(&conn, &source.id).unwrap(), 2);
    }

    #[test]
    fn latest_extraction_ties_go_to_last_insert() {
        let conn = test_db();
        let alice = owner("alice");
        let source = make_source(&alice, SourceKind::Pdf, "a.pdf");
        let first = make_record(&source, "first");
        commit_ingestion(&conn, &source, &first).unwrap();

        let mut second = make_record(&source, "second");
        second.created_at = first.created_at;
        insert_extraction_record(&conn, &second).unwrap();

        let latest = latest_extraction_for_source(&conn, &source.id).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[test]
    fn extraction_records_are_write_once() {
        let conn = test_db();
        let alice = owner("alice");
        let source = make_source(&alice, SourceKind::Pdf, "a.pdf");
        let record = make_record(&source, "x");
        commit_ingestion(&conn, &source, &record).unwrap();

        let result = conn.execute(
            "UPDATE extraction_records SET payload = '{}' WHERE id = ?1",
            [record.id.to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn cascade_delete_removes_children_first() {
        let conn = test_db();
        let alice = owner("alice");
        let source = make_source(&alice, SourceKind::Pdf, "a.pdf");
        commit_ingestion(&conn, &source, &make_record(&source, "x")).unwrap();
        insert_extraction_record(&conn, &make_record(&source, "y")).unwrap();

        let removed = delete_source_cascade(&conn, &source.id, &alice).unwrap();
        assert_eq!(removed, Some(2));
        assert!(get_source_for_owner(&conn, &source.id, &alice).unwrap().is_none());
        assert_eq!(count_extractions_for_source(&conn, &source.id).unwrap(), 0);

        assert_eq!(delete_source_cascade(&conn, &source.id, &alice).unwrap(), None);
    }

    #[test]
    fn record_requires_existing_source() {
        let conn = test_db();
        let alice = owner("alice");
        let orphan = make_source(&alice, SourceKind::Pdf, "ghost.pdf");
        let result = insert_extraction_record(&conn, &make_record(&orphan, "x"));
        assert!(result.is_err());
    }

    #[test]
    fn count_sources_sharing_file() {
        let conn = test_db();
        let alice = owner("alice");
        let a = make_source(&alice, SourceKind::Pdf, "same.pdf");
        let b = make_source(&alice, SourceKind::Pdf, "same.pdf");
        commit_ingestion(&conn, &a, &make_record(&a, "1")).unwrap();
        commit_ingestion(&conn, &b, &make_record(&b, "2")).unwrap();

        assert_eq!(count_sources_with_file(&conn, &alice, "same.pdf").unwrap(), 2);
        assert_eq!(
            count_sources_with_file(&conn, &owner("bob"), "same.pdf").unwrap(),
            0
        );
    }

    #[test]
    fn audit_entries_append_and_query() {
        let conn = test_db();
        let alice = owner("alice");
        let source_id = Uuid::new_v4();

        let first = AuditEntry::new(Some(alice.clone()), AuditAction::UploadAttempt, "accepted")
            .for_source(source_id);
        let second = AuditEntry::new(Some(alice.clone()), AuditAction::UploadSuccess, "stored")
            .for_source(source_id);
        let id1 = insert_audit_entry(&conn, &first).unwrap();
        let id2 = insert_audit_entry(&conn, &second).unwrap();
        assert!(id2 > id1);

        let by_actor = query_audit_by_actor(&conn, &alice, 10).unwrap();
        assert_eq!(by_actor.len(), 2);
        assert_eq!(by_actor[0].action, AuditAction::UploadSuccess);

        let by_source = query_audit_by_source(&conn, &source_id).unwrap();
        assert_eq!(by_source[0].action, AuditAction::UploadAttempt);
        assert_eq!(by_source[1].source_id, Some(source_id));

        let limited = query_audit_by_actor(&conn, &alice, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(count_audit_events(&conn).unwrap(), 2);
    }

    #[test]
    fn audit_rows_reject_update_and_delete() {
        let conn = test_db();
        let entry = AuditEntry::new(None, AuditAction::UploadAttempt, "anonymous");
        let id = insert_audit_entry(&conn, &entry).unwrap();

        assert!(conn
            .execute("UPDATE audit_events SET detail = 'x' WHERE id = ?1", [id])
            .is_err());
        assert!(conn
            .execute("DELETE FROM audit_events WHERE id = ?1", [id])
            .is_err());
        assert_eq!(count_audit_events(&conn).unwrap(), 1);
    }

    #[test]
    fn audit_outlives_deleted_source() {
        let conn = test_db();
        let alice = owner("alice");
        let source = make_source(&alice, SourceKind::Pdf, "a.pdf");
        commit_ingestion(&conn, &source, &make_record(&source, "x")).unwrap();
        insert_audit_entry(
            &conn,
            &AuditEntry::new(Some(alice.clone()), AuditAction::UploadSuccess, "ok")
                .for_source(source.id),
        )
        .unwrap();

        delete_source_cascade(&conn, &source.id, &alice).unwrap();
        assert_eq!(query_audit_by_source(&conn, &source.id).unwrap().len(), 1);
    }

    #[test]
    fn timestamps_round_trip_with_micros() {
        let now = Utc::now();
        let text = format_timestamp(&now);
        assert!(text.ends_with('Z'));
        let back = parse_timestamp("t", &text).unwrap();
        assert_eq!(back.timestamp_micros(), now.timestamp_micros());
    }
}
