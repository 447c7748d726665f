// src/reconciler.rs
//! One save attempt against a versioned document.
//!
//! The editor submits what it remembers as the common base alongside its new
//! text. A stale version is answered by merging each field three ways against
//! the server's current text. A clean merge is written back once; anything
//! else goes back to the caller with both sides intact.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::merge::{merge3, merge_text, MergeResult};
use crate::models::{ConflictPayload, Document, RevisionOrigin, UpdateRequest};
use crate::store::{StoreError, VersionedDocumentStore, WriteOutcome};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("storage failure: {0}")]
    Fatal(#[source] StoreError),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => ReconcileError::NotFound { id },
            other => ReconcileError::Fatal(other),
        }
    }
}

/// The editor's side of a save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAttempt {
    pub id: String,
    pub version: i64,
    pub base_title: String,
    pub base_description: Option<String>,
    pub new_title: String,
    pub new_description: Option<String>,
}

impl From<&UpdateRequest> for EditAttempt {
    fn from(req: &UpdateRequest) -> Self {
        Self {
            id: req.id.clone(),
            version: req.version,
            base_title: req.base_title.clone(),
            base_description: req.base_description.clone(),
            new_title: req.title.clone(),
            new_description: req.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written. `merged` is set when the committed text came from an
    /// automatic merge rather than straight from the editor.
    Committed { document: Document, merged: bool },

    /// Needs the caller's attention. Nothing was written by this attempt.
    Conflicted {
        title: MergeResult,
        description: MergeResult,
        current: Document,
    },
}

impl SaveOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SaveOutcome::Committed { .. })
    }

    /// The 409 body for a conflicted outcome
    pub fn conflict_payload(&self) -> Option<ConflictPayload> {
        match self {
            SaveOutcome::Committed { .. } => None,
            SaveOutcome::Conflicted {
                title,
                description,
                current,
            } => Some(ConflictPayload {
                conflicted_title: if title.had_conflict {
                    title.text.clone()
                } else {
                    None
                },
                conflicted_description: if description.had_conflict {
                    description.text.clone()
                } else {
                    None
                },
                current_version: current.version,
                current_title: current.title.clone(),
                current_description: current.description.clone(),
            }),
        }
    }
}

pub struct UpdateReconciler<S> {
    store: S,
}

impl<S: VersionedDocumentStore> UpdateReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn reconcile(&self, attempt: &EditAttempt) -> Result<SaveOutcome, ReconcileError> {
        self.reconcile_as(attempt, RevisionOrigin::Interactive)
    }

    /// Reconcile with the committed revision tagged `origin`. An automatic
    /// merge of an interactive save is tagged [`RevisionOrigin::Merged`].
    pub fn reconcile_as(
        &self,
        attempt: &EditAttempt,
        origin: RevisionOrigin,
    ) -> Result<SaveOutcome, ReconcileError> {
        let outcome = self.store.write_if_version_as(
            &attempt.id,
            attempt.version,
            &attempt.new_title,
            attempt.new_description.as_deref(),
            origin,
        )?;

        let current = match outcome {
            WriteOutcome::Written(document) => {
                return Ok(SaveOutcome::Committed {
                    document,
                    merged: false,
                })
            }
            WriteOutcome::Conflict(current) => current,
        };

        log::info!(
            "Version conflict on {} (sent {}, current {}), merging",
            attempt.id,
            attempt.version,
            current.version
        );

        let (title, description) = merge_fields(attempt, &current);
        if title.had_conflict || description.had_conflict {
            log::info!("Merge conflict on {}, returning to caller", attempt.id);
            return Ok(SaveOutcome::Conflicted {
                title,
                description,
                current,
            });
        }

        // Clean merge: one retry against the version we just saw
        let merged_title = title.text.clone().unwrap_or_default();
        let retry_origin = match origin {
            RevisionOrigin::Interactive => RevisionOrigin::Merged,
            other => other,
        };
        let retry = self.store.write_if_version_as(
            &attempt.id,
            current.version,
            &merged_title,
            description.text.as_deref(),
            retry_origin,
        )?;

        match retry {
            WriteOutcome::Written(document) => {
                log::debug!("Merged save of {} committed at {}", attempt.id, document.version);
                Ok(SaveOutcome::Committed {
                    document,
                    merged: true,
                })
            }
            WriteOutcome::Conflict(newest) => {
                log::info!(
                    "Document {} moved again to {} during merged retry",
                    attempt.id,
                    newest.version
                );
                let (title, description) = merge_fields(attempt, &newest);
                Ok(SaveOutcome::Conflicted {
                    title,
                    description,
                    current: newest,
                })
            }
        }
    }
}

fn merge_fields(attempt: &EditAttempt, current: &Document) -> (MergeResult, MergeResult) {
    let title = merge_text(&attempt.base_title, &current.title, &attempt.new_title);
    let description = merge3(
        attempt.base_description.as_deref(),
        current.description.as_deref(),
        attempt.new_description.as_deref(),
    );
    (title, description)
}
