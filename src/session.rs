// src/session.rs
//! Editor-side state for one open document.
//!
//! The session remembers the last text it knows the server had (the base)
//! next to the user's pending edits. That base is what makes a three-way
//! merge possible when somebody else saved in between.

use serde::{Deserialize, Serialize};

use crate::client::UpdateResponse;
use crate::merge::{has_conflict_markers, merge3, merge_text};
use crate::models::{ConflictPayload, Document, UpdateRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSession {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub version: i64,
    pub base_title: String,
    pub base_description: Option<String>,
}

/// What the editor should show after a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Saved,
    /// Markers are in the text; the user keeps editing and saves again
    NeedsResolution,
    /// Stale but mergeable; the next save will go through
    Rebased,
}

impl EditorSession {
    pub fn open(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            version: doc.version,
            base_title: doc.title.clone(),
            base_description: doc.description.clone(),
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn is_modified(&self) -> bool {
        self.title != self.base_title || self.description != self.base_description
    }

    pub fn has_unresolved_markers(&self) -> bool {
        has_conflict_markers(&self.title)
            || self.description.as_deref().is_some_and(has_conflict_markers)
    }

    pub fn update_request(&self) -> UpdateRequest {
        UpdateRequest {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            version: self.version,
            base_title: self.base_title.clone(),
            base_description: self.base_description.clone(),
            unload: false,
        }
    }

    /// The page-close save, if there is anything to save
    pub fn unload_request(&self) -> Option<UpdateRequest> {
        if !self.is_modified() {
            return None;
        }
        let mut request = self.update_request();
        request.unload = true;
        Some(request)
    }

    pub fn apply(&mut self, response: &UpdateResponse) -> SessionStatus {
        match response {
            UpdateResponse::Saved(doc) => {
                *self = Self::open(doc);
                SessionStatus::Saved
            }
            UpdateResponse::Conflict(payload) => self.rebase(payload),
        }
    }

    /// Move onto the server's current version, keeping the user's edits.
    /// Fields the server marked as conflicted take the marker text; the rest
    /// are merged locally.
    fn rebase(&mut self, payload: &ConflictPayload) -> SessionStatus {
        let title = match &payload.conflicted_title {
            Some(marked) => marked.clone(),
            None => merge_text(&self.base_title, &payload.current_title, &self.title)
                .text
                .unwrap_or_else(|| self.title.clone()),
        };
        let description = match &payload.conflicted_description {
            Some(marked) => Some(marked.clone()),
            None => {
                merge3(
                    self.base_description.as_deref(),
                    payload.current_description.as_deref(),
                    self.description.as_deref(),
                )
                .text
            }
        };

        self.title = title;
        self.description = description;
        self.version = payload.current_version;
        self.base_title = payload.current_title.clone();
        self.base_description = payload.current_description.clone();

        if payload.conflicted_title.is_some() || payload.conflicted_description.is_some() {
            SessionStatus::NeedsResolution
        } else {
            SessionStatus::Rebased
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(version: i64, title: &str, description: Option<&str>) -> Document {
        Document {
            id: "doc-1".to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            version,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fresh_session_is_clean() {
        let session = EditorSession::open(&doc(3, "Fix bug", None));
        assert!(!session.is_modified());
        assert!(session.unload_request().is_none());
    }

    #[test]
    fn test_request_carries_base() {
        let mut session = EditorSession::open(&doc(3, "Fix bug", Some("notes")));
        session.set_title("Fix bug urgently");

        let req = session.update_request();
        assert_eq!(req.version, 3);
        assert_eq!(req.title, "Fix bug urgently");
        assert_eq!(req.base_title, "Fix bug");
        assert_eq!(req.base_description.as_deref(), Some("notes"));
        assert!(!req.unload);
        assert!(session.unload_request().unwrap().unload);
    }

    #[test]
    fn test_saved_response_becomes_new_base() {
        let mut session = EditorSession::open(&doc(3, "Fix bug", None));
        session.set_title("Fix crash");

        let status = session.apply(&UpdateResponse::Saved(doc(4, "Fix crash", None)));
        assert_eq!(status, SessionStatus::Saved);
        assert_eq!(session.version, 4);
        assert_eq!(session.base_title, "Fix crash");
        assert!(!session.is_modified());
    }

    #[test]
    fn test_conflict_response_shows_markers() {
        let mut session = EditorSession::open(&doc(3, "Fix bug", Some("notes")));
        session.set_title("Fix bug urgently");
        let marked = "<<<<<<< yours\nFix bug urgently\n=======\nFix crash\n>>>>>>> theirs";

        let status = session.apply(&UpdateResponse::Conflict(ConflictPayload {
            conflicted_title: Some(marked.to_string()),
            conflicted_description: None,
            current_version: 4,
            current_title: "Fix crash".to_string(),
            current_description: Some("notes, with repro".to_string()),
        }));

        assert_eq!(status, SessionStatus::NeedsResolution);
        assert_eq!(session.title, marked);
        // Untouched locally, so the server's description is taken
        assert_eq!(session.description.as_deref(), Some("notes, with repro"));
        assert_eq!(session.version, 4);
        assert_eq!(session.base_title, "Fix crash");
        assert!(session.has_unresolved_markers());

        session.set_title("Fix crash urgently");
        assert!(!session.has_unresolved_markers());
        assert_eq!(session.update_request().version, 4);
    }

    #[test]
    fn test_stale_conflict_rebases_cleanly() {
        let mut session = EditorSession::open(&doc(1, "Draft", Some("Draft")));
        session.set_title("Final");

        let status = session.apply(&UpdateResponse::Conflict(ConflictPayload {
            conflicted_title: None,
            conflicted_description: None,
            current_version: 3,
            current_title: "Draft".to_string(),
            current_description: Some("Draft v3".to_string()),
        }));

        assert_eq!(status, SessionStatus::Rebased);
        assert_eq!(session.title, "Final");
        assert_eq!(session.description.as_deref(), Some("Draft v3"));
        assert_eq!(session.version, 3);
        assert!(session.is_modified());
    }
}
