// src/revision_log.rs
use rusqlite::{params, Connection};

use crate::db_utils::millis_to_datetime;
use crate::models::{Document, Revision, RevisionOrigin};
use crate::store::StoreError;

/// Append the committed state of `doc` to its history.
///
/// A version is recorded at most once; a repeat for the same version is
/// ignored.
pub fn record_revision(
    conn: &Connection,
    doc: &Document,
    origin: RevisionOrigin,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO revisions
         (document_id, version, title, description, origin, committed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            doc.id,
            doc.version,
            doc.title,
            doc.description,
            origin.as_str(),
            doc.updated_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

/// All recorded revisions of a document, oldest first
pub fn list_revisions(conn: &Connection, document_id: &str) -> Result<Vec<Revision>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT document_id, version, title, description, origin, committed_at
         FROM revisions
         WHERE document_id = ?1
         ORDER BY version ASC",
    )?;

    let revisions = stmt
        .query_map([document_id], |row| {
            Ok(Revision {
                document_id: row.get(0)?,
                version: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                origin: RevisionOrigin::parse(&row.get::<_, String>(4)?),
                committed_at: millis_to_datetime(row.get(5)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(revisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_utils::ensure_schema;
    use chrono::Utc;

    fn doc(version: i64, title: &str) -> Document {
        Document {
            id: "doc-1".to_string(),
            title: title.to_string(),
            description: None,
            version,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_revisions_in_version_order() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        record_revision(&conn, &doc(2, "Fix crash"), RevisionOrigin::Merged).unwrap();
        record_revision(&conn, &doc(1, "Fix bug"), RevisionOrigin::Create).unwrap();

        let revisions = list_revisions(&conn, "doc-1").unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].title, "Fix bug");
        assert_eq!(revisions[0].origin, RevisionOrigin::Create);
        assert_eq!(revisions[1].origin, RevisionOrigin::Merged);
    }

    #[test]
    fn test_duplicate_version_ignored() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        record_revision(&conn, &doc(1, "first"), RevisionOrigin::Create).unwrap();
        record_revision(&conn, &doc(1, "second"), RevisionOrigin::Interactive).unwrap();

        let revisions = list_revisions(&conn, "doc-1").unwrap();
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].title, "first");
    }
}
