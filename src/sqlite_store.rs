//! SQLite-backed [`VersionedDocumentStore`].
//!
//! The version check is part of the `UPDATE` itself, so two writers holding
//! the same version cannot both succeed no matter how their connections
//! interleave.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use crate::db_utils::{millis_to_datetime, Database};
use crate::models::{Document, RevisionOrigin};
use crate::revision_log;
use crate::store::{StoreError, VersionedDocumentStore, WriteOutcome};

const DOCUMENT_COLUMNS: &str = "id, title, description, version, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    db: Database,
}

impl SqliteDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        version: row.get(3)?,
        created_at: millis_to_datetime(row.get(4)?),
        updated_at: millis_to_datetime(row.get(5)?),
    })
}

fn read_document(conn: &Connection, id: &str) -> Result<Document, StoreError> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
        [id],
        row_to_document,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

impl VersionedDocumentStore for SqliteDocumentStore {
    fn create(&self, title: &str, description: Option<&str>) -> Result<Document, StoreError> {
        let mut conn = self.db.connect()?;
        // Stored at millisecond precision; hand back what a read would return
        let now = millis_to_datetime(Utc::now().timestamp_millis());
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO documents (id, title, description, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.id,
                doc.title,
                doc.description,
                doc.version,
                now.timestamp_millis(),
                now.timestamp_millis(),
            ],
        )?;
        revision_log::record_revision(&tx, &doc, RevisionOrigin::Create)?;
        tx.commit()?;

        log::debug!("Created document {}", doc.id);
        Ok(doc)
    }

    fn read(&self, id: &str) -> Result<Document, StoreError> {
        let conn = self.db.connect()?;
        read_document(&conn, id)
    }

    fn write_if_version(
        &self,
        id: &str,
        expected_version: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<WriteOutcome, StoreError> {
        self.write_if_version_as(
            id,
            expected_version,
            title,
            description,
            RevisionOrigin::Interactive,
        )
    }

    /// The conditional update and its revision row commit together, so every
    /// committed version has exactly one history entry.
    fn write_if_version_as(
        &self,
        id: &str,
        expected_version: i64,
        title: &str,
        description: Option<&str>,
        origin: RevisionOrigin,
    ) -> Result<WriteOutcome, StoreError> {
        let mut conn = self.db.connect()?;
        let now = Utc::now().timestamp_millis();

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let written = tx
            .query_row(
                &format!(
                    "UPDATE documents
                     SET title = ?1, description = ?2, version = version + 1, updated_at = ?3
                     WHERE id = ?4 AND version = ?5
                     RETURNING {DOCUMENT_COLUMNS}"
                ),
                params![title, description, now, id, expected_version],
                row_to_document,
            )
            .optional()?;

        let outcome = match written {
            Some(doc) => {
                revision_log::record_revision(&tx, &doc, origin)?;
                log::debug!("Document {} written at version {}", id, doc.version);
                WriteOutcome::Written(doc)
            }
            None => {
                let current = read_document(&tx, id)?;
                log::debug!(
                    "Version conflict on {}: expected {}, stored {}",
                    id,
                    expected_version,
                    current.version
                );
                WriteOutcome::Conflict(current)
            }
        };
        tx.commit()?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, SqliteDocumentStore) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path().join("copany.db"), Duration::from_secs(5)).unwrap();
        (temp_dir, SqliteDocumentStore::new(db))
    }

    #[test]
    fn test_create_and_read() {
        let (_temp_dir, store) = temp_store();
        let doc = store.create("Fix bug", Some("It crashes")).unwrap();

        let loaded = store.read(&doc.id).unwrap();
        assert_eq!(loaded.title, "Fix bug");
        assert_eq!(loaded.description.as_deref(), Some("It crashes"));
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.created_at.timestamp_millis(), doc.created_at.timestamp_millis());
    }

    #[test]
    fn test_null_description_survives() {
        let (_temp_dir, store) = temp_store();
        let doc = store.create("Fix bug", None).unwrap();
        assert!(store.read(&doc.id).unwrap().description.is_none());
    }

    #[test]
    fn test_conditional_write() {
        let (_temp_dir, store) = temp_store();
        let doc = store.create("Fix bug", None).unwrap();

        let outcome = store.write_if_version(&doc.id, 1, "Fix crash", Some("trace")).unwrap();
        let written = match outcome {
            WriteOutcome::Written(d) => d,
            other => panic!("expected write, got {:?}", other),
        };
        assert_eq!(written.version, 2);
        assert_eq!(written.description.as_deref(), Some("trace"));
        assert!(written.updated_at.timestamp_millis() >= doc.updated_at.timestamp_millis());

        let outcome = store.write_if_version(&doc.id, 1, "Stale", None).unwrap();
        match outcome {
            WriteOutcome::Conflict(current) => {
                assert_eq!(current.version, 2);
                assert_eq!(current.title, "Fix crash");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_every_write_lands_in_history() {
        let (_temp_dir, store) = temp_store();
        let doc = store.create("Fix bug", None).unwrap();
        store.write_if_version(&doc.id, 1, "Fix crash", None).unwrap();
        store
            .write_if_version_as(&doc.id, 2, "Fix crash now", None, RevisionOrigin::Merged)
            .unwrap();
        // A stale write commits nothing and records nothing
        store.write_if_version(&doc.id, 1, "Stale", None).unwrap();

        let conn = store.database().connect().unwrap();
        let history = revision_log::list_revisions(&conn, &doc.id).unwrap();
        let origins: Vec<_> = history.iter().map(|r| r.origin).collect();
        assert_eq!(
            origins,
            vec![
                RevisionOrigin::Create,
                RevisionOrigin::Interactive,
                RevisionOrigin::Merged
            ]
        );
        assert_eq!(history[2].version, 3);
        assert_eq!(history[2].title, "Fix crash now");
    }

    #[test]
    fn test_write_unknown_id() {
        let (_temp_dir, store) = temp_store();
        let result = store.write_if_version("missing", 1, "x", None);
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
