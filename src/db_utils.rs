// src/db_utils.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::store::StoreError;

/// Location of the SQLite file plus connection settings. Every operation
/// opens its own connection; nothing is shared between requests.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Create the file (and parent directory) if needed and bring the schema
    /// up to date.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Self { path, busy_timeout };
        let conn = db.connect()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        ensure_schema(&conn)?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

pub fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id          TEXT    PRIMARY KEY,
            title       TEXT    NOT NULL,
            description TEXT,
            version     INTEGER NOT NULL,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS revisions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id  TEXT    NOT NULL,
            version      INTEGER NOT NULL,
            title        TEXT    NOT NULL,
            description  TEXT,
            origin       TEXT    NOT NULL,
            committed_at INTEGER NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(id)
        );

        CREATE TABLE IF NOT EXISTS conflicts (
            id            TEXT PRIMARY KEY,
            document_id   TEXT NOT NULL,
            field         TEXT NOT NULL,
            base_text     TEXT,
            theirs_text   TEXT,
            yours_text    TEXT,
            merged_text   TEXT NOT NULL,
            hunks         TEXT NOT NULL,
            status        TEXT NOT NULL DEFAULT 'unresolved',
            resolved_text TEXT,
            detected_at   INTEGER NOT NULL,
            resolved_at   INTEGER
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_revisions_document_version
            ON revisions(document_id, version);
        CREATE INDEX IF NOT EXISTS idx_conflicts_status ON conflicts(status);
        CREATE INDEX IF NOT EXISTS idx_conflicts_document ON conflicts(document_id);
        "#,
    )?;
    Ok(())
}

pub fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
