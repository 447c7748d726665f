//! Versioned document persistence.
//!
//! A store hands out documents together with their version and accepts a
//! write only when the caller's expected version is still current. The check
//! and the write happen as one atomic step in every implementation; callers
//! never read-modify-write on their own.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Document, RevisionOrigin};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Result of a conditional write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write landed; carries the document as committed
    Written(Document),
    /// The expected version was stale; carries the current server state
    Conflict(Document),
}

pub trait VersionedDocumentStore: Send + Sync {
    fn create(&self, title: &str, description: Option<&str>) -> Result<Document, StoreError>;

    fn read(&self, id: &str) -> Result<Document, StoreError>;

    /// Replace title and description if the stored version equals
    /// `expected_version`, bumping the version by one.
    fn write_if_version(
        &self,
        id: &str,
        expected_version: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<WriteOutcome, StoreError>;

    /// Same as [`write_if_version`](Self::write_if_version), tagging the
    /// committed revision with where the write came from. Stores that keep
    /// no history ignore the tag.
    fn write_if_version_as(
        &self,
        id: &str,
        expected_version: i64,
        title: &str,
        description: Option<&str>,
        _origin: RevisionOrigin,
    ) -> Result<WriteOutcome, StoreError> {
        self.write_if_version(id, expected_version, title, description)
    }
}

/// Non-durable store for tests and embedding. The map lock makes each
/// compare-and-write atomic.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<HashMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionedDocumentStore for InMemoryDocumentStore {
    fn create(&self, title: &str, description: Option<&str>) -> Result<Document, StoreError> {
        let now = Utc::now();
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let mut documents = self.documents.lock().map_err(|_| StoreError::Poisoned)?;
        documents.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    fn read(&self, id: &str) -> Result<Document, StoreError> {
        let documents = self.documents.lock().map_err(|_| StoreError::Poisoned)?;
        documents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn write_if_version(
        &self,
        id: &str,
        expected_version: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<WriteOutcome, StoreError> {
        let mut documents = self.documents.lock().map_err(|_| StoreError::Poisoned)?;
        let doc = documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if doc.version != expected_version {
            return Ok(WriteOutcome::Conflict(doc.clone()));
        }

        doc.title = title.to_string();
        doc.description = description.map(str::to_string);
        doc.version += 1;
        doc.updated_at = Utc::now();
        Ok(WriteOutcome::Written(doc.clone()))
    }
}
