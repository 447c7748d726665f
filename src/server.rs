//! HTTP surface.
//!
//! Routes:
//! - `POST /document` - Create a document
//! - `GET  /document/{id}` - Current title, description and version
//! - `GET  /document/{id}/history` - Committed revisions
//! - `POST /document/update` - Versioned save (interactive or page-close)
//! - `GET  /conflicts` - Unresolved conflicts recorded by page-close saves
//! - `POST /conflicts/{id}/resolve` - Mark a recorded conflict resolved
//! - `GET  /health`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;

use crate::conflict_commands;
use crate::conflict_store;
use crate::merge::merge3;
use crate::models::{
    CreateDocumentInput, Document, DocumentResponse, Field, RevisionOrigin, UnloadResponse,
    UpdateRequest,
};
use crate::reconciler::{EditAttempt, ReconcileError, SaveOutcome, UpdateReconciler};
use crate::revision_log;
use crate::sqlite_store::SqliteDocumentStore;
use crate::store::{StoreError, VersionedDocumentStore, WriteOutcome};

#[derive(Clone)]
pub struct AppState {
    store: SqliteDocumentStore,
}

impl AppState {
    pub fn new(store: SqliteDocumentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SqliteDocumentStore {
        &self.store
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::InvalidResolution(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ReconcileError::Fatal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/document", post(create_document))
        .route("/document/update", post(update_document))
        .route("/document/{id}", get(get_document))
        .route("/document/{id}/history", get(get_history))
        .route("/conflicts", get(conflict_commands::list_conflicts))
        .route(
            "/conflicts/{id}/resolve",
            post(conflict_commands::resolve_conflict),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_document(
    State(state): State<AppState>,
    Json(input): Json<CreateDocumentInput>,
) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let document = tokio::task::spawn_blocking(move || {
        store.create(&input.title, input.description.as_deref())
    })
    .await??;

    log::info!("Created document {}", document.id);
    Ok((StatusCode::CREATED, Json(DocumentResponse { document })).into_response())
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let store = state.store.clone();
    let document = tokio::task::spawn_blocking(move || store.read(&id)).await??;
    Ok(Json(DocumentResponse { document }))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = state.store.clone();
    let revisions = tokio::task::spawn_blocking(move || {
        // 404 for unknown documents rather than an empty list
        store.read(&id)?;
        let conn = store.database().connect()?;
        revision_log::list_revisions(&conn, &id)
    })
    .await??;
    Ok(Json(serde_json::json!({ "revisions": revisions })))
}

async fn update_document(
    State(state): State<AppState>,
    Json(req): Json<UpdateRequest>,
) -> Result<Response, ApiError> {
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || apply_update(&store, &req)).await?
}

fn apply_update(store: &SqliteDocumentStore, req: &UpdateRequest) -> Result<Response, ApiError> {
    let attempt = EditAttempt::from(req);
    let origin = if req.unload {
        RevisionOrigin::Unload
    } else {
        RevisionOrigin::Interactive
    };
    let reconciler = UpdateReconciler::new(store.clone());
    let outcome = reconciler.reconcile_as(&attempt, origin)?;

    match outcome {
        SaveOutcome::Committed { document, .. } => {
            Ok(Json(DocumentResponse { document }).into_response())
        }
        conflicted if req.unload => {
            let response = commit_unload_conflict(store, &attempt, conflicted)?;
            Ok((StatusCode::ACCEPTED, Json(response)).into_response())
        }
        conflicted => match conflicted.conflict_payload() {
            Some(payload) => Ok((StatusCode::CONFLICT, Json(payload)).into_response()),
            None => Err(ApiError::Internal("conflict without payload".to_string())),
        },
    }
}

/// Nobody will read a 409 on page close, so the conflict is kept server-side:
/// each conflicted field is recorded with both texts, and the merged text is
/// committed so the edit stays visible in the document. If that commit is
/// overtaken as well, every field the editor changed is recorded so the edit
/// survives in the conflict log.
fn commit_unload_conflict(
    store: &SqliteDocumentStore,
    attempt: &EditAttempt,
    outcome: SaveOutcome,
) -> Result<UnloadResponse, ApiError> {
    let (title, description, current) = match outcome {
        SaveOutcome::Conflicted {
            title,
            description,
            current,
        } => (title, description, current),
        SaveOutcome::Committed { document, .. } => {
            return Ok(UnloadResponse {
                document: Some(document),
                conflict_ids: Vec::new(),
            })
        }
    };

    let conn = store.database().connect()?;
    let mut recorded = Vec::new();

    for (field, result) in [(Field::Title, &title), (Field::Description, &description)] {
        if !result.had_conflict {
            continue;
        }
        let (base, yours) = editor_side(attempt, field);
        let conflict = conflict_store::new_conflict(
            &attempt.id,
            field,
            base,
            server_side(&current, field),
            yours,
            result.text.as_deref().unwrap_or_default(),
        );
        conflict_store::store_conflict(&conn, &conflict)?;
        recorded.push((field, conflict.id));
    }

    if !recorded.is_empty() {
        log::warn!(
            "Unload save of {} conflicted; recorded {} conflict(s)",
            attempt.id,
            recorded.len()
        );
    }

    let merged_title = title.text.unwrap_or_else(|| current.title.clone());
    let outcome = store.write_if_version_as(
        &attempt.id,
        current.version,
        &merged_title,
        description.text.as_deref(),
        RevisionOrigin::Unload,
    )?;

    let document = match outcome {
        WriteOutcome::Written(document) => Some(document),
        WriteOutcome::Conflict(newest) => {
            for field in [Field::Title, Field::Description] {
                let (base, yours) = editor_side(attempt, field);
                if recorded.iter().any(|(f, _)| *f == field) || text_eq(base, yours) {
                    continue;
                }
                let theirs = server_side(&newest, field);
                let merged = merge3(base, theirs, yours);
                let conflict = conflict_store::new_conflict(
                    &attempt.id,
                    field,
                    base,
                    theirs,
                    yours,
                    merged.text.as_deref().unwrap_or_default(),
                );
                conflict_store::store_conflict(&conn, &conflict)?;
                recorded.push((field, conflict.id));
            }
            log::warn!(
                "Document {} moved to {} before the unload merge landed; edit kept in {} conflict(s)",
                attempt.id,
                newest.version,
                recorded.len()
            );
            None
        }
    };

    Ok(UnloadResponse {
        document,
        conflict_ids: recorded.into_iter().map(|(_, id)| id).collect(),
    })
}

fn editor_side(attempt: &EditAttempt, field: Field) -> (Option<&str>, Option<&str>) {
    match field {
        Field::Title => (
            Some(attempt.base_title.as_str()),
            Some(attempt.new_title.as_str()),
        ),
        Field::Description => (
            attempt.base_description.as_deref(),
            attempt.new_description.as_deref(),
        ),
    }
}

fn server_side(document: &Document, field: Field) -> Option<&str> {
    match field {
        Field::Title => Some(document.title.as_str()),
        Field::Description => document.description.as_deref(),
    }
}

fn text_eq(a: Option<&str>, b: Option<&str>) -> bool {
    a.unwrap_or("") == b.unwrap_or("")
}
