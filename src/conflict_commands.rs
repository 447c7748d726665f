use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::conflict_store;
use crate::models::{ConflictRecord, ResolutionInput};
use crate::server::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictQuery {
    pub document_id: Option<String>,
}

/// Get all unresolved conflicts, optionally for one document
pub async fn list_conflicts(
    State(state): State<AppState>,
    Query(query): Query<ConflictQuery>,
) -> Result<Json<Vec<ConflictRecord>>, ApiError> {
    let db = state.store().database().clone();
    let conflicts = tokio::task::spawn_blocking(move || {
        let conn = db.connect()?;
        conflict_store::get_unresolved_conflicts(&conn, query.document_id.as_deref())
    })
    .await??;
    Ok(Json(conflicts))
}

/// Resolve a conflict with the user's choice
pub async fn resolve_conflict(
    State(state): State<AppState>,
    Path(conflict_id): Path<String>,
    Json(resolution): Json<ResolutionInput>,
) -> Result<Json<ConflictRecord>, ApiError> {
    let db = state.store().database().clone();
    let conflict = tokio::task::spawn_blocking(move || {
        let conn = db.connect()?;
        conflict_store::resolve_conflict(&conn, &conflict_id, &resolution)
    })
    .await??;

    log::info!(
        "Conflict {} on {} resolved as {}",
        conflict.id,
        conflict.document_id,
        conflict.status.as_str()
    );
    Ok(Json(conflict))
}
