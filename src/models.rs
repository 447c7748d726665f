use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hunks::Hunk;

/// The editable surface of an issue: its title and Markdown description,
/// guarded by an optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub version: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Which editable field a conflict belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Description,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
        }
    }

    pub fn parse(s: &str) -> Field {
        match s {
            "description" => Field::Description,
            _ => Field::Title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Unresolved,
    ResolvedYours,  // Kept the editor's text
    ResolvedTheirs, // Kept the server's text
    ResolvedMerged, // Manual merge
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Unresolved => "unresolved",
            ConflictStatus::ResolvedYours => "resolved_yours",
            ConflictStatus::ResolvedTheirs => "resolved_theirs",
            ConflictStatus::ResolvedMerged => "resolved_merged",
        }
    }

    pub fn parse(s: &str) -> ConflictStatus {
        match s {
            "resolved_yours" => ConflictStatus::ResolvedYours,
            "resolved_theirs" => ConflictStatus::ResolvedTheirs,
            "resolved_merged" => ConflictStatus::ResolvedMerged,
            _ => ConflictStatus::Unresolved,
        }
    }
}

/// A merge conflict on one field from a page-close save, kept so that
/// neither side's text is lost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub id: String,
    pub document_id: String,
    pub field: Field,
    pub base: Option<String>,
    pub theirs: Option<String>,
    pub yours: Option<String>,
    /// Marker text produced by the merge
    pub merged: String,
    pub hunks: Vec<Hunk>,
    pub status: ConflictStatus,
    pub resolved_text: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub detected_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Input for conflict resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionInput {
    pub resolution: ConflictStatus,
    pub merged_text: Option<String>, // For manual merge
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionOrigin {
    Create,
    Interactive,
    /// Committed after an automatic clean merge
    Merged,
    Unload,
}

impl RevisionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionOrigin::Create => "create",
            RevisionOrigin::Interactive => "interactive",
            RevisionOrigin::Merged => "merged",
            RevisionOrigin::Unload => "unload",
        }
    }

    pub fn parse(s: &str) -> RevisionOrigin {
        match s {
            "create" => RevisionOrigin::Create,
            "merged" => RevisionOrigin::Merged,
            "unload" => RevisionOrigin::Unload,
            _ => RevisionOrigin::Interactive,
        }
    }
}

/// One committed state of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub document_id: String,
    pub version: i64,
    pub title: String,
    pub description: Option<String>,
    pub origin: RevisionOrigin,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub committed_at: DateTime<Utc>,
}

/// Body of `POST /document/update`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub version: i64,
    pub base_title: String,
    pub base_description: Option<String>,
    /// Sent by the page-close transport, which cannot read the response
    #[serde(default)]
    pub unload: bool,
}

/// Body of the 409 response: enough to re-render markers and let the user
/// resolve them by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictPayload {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub conflicted_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub conflicted_description: Option<String>,
    pub current_version: i64,
    pub current_title: String,
    pub current_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub document: Document,
}

/// Reply to an unload save. The browser never reads it; tests and logs do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnloadResponse {
    pub document: Option<Document>,
    pub conflict_ids: Vec<String>,
}
