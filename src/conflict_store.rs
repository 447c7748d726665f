use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db_utils::millis_to_datetime;
use crate::hunks::{calculate_hunks, Hunk};
use crate::models::{ConflictRecord, ConflictStatus, Field, ResolutionInput};
use crate::store::StoreError;

/// Build an unresolved record for one conflicted field. Hunks compare the
/// server's text against the editor's.
pub fn new_conflict(
    document_id: &str,
    field: Field,
    base: Option<&str>,
    theirs: Option<&str>,
    yours: Option<&str>,
    merged: &str,
) -> ConflictRecord {
    ConflictRecord {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        field,
        base: base.map(str::to_string),
        theirs: theirs.map(str::to_string),
        yours: yours.map(str::to_string),
        merged: merged.to_string(),
        hunks: calculate_hunks(theirs.unwrap_or(""), yours.unwrap_or("")),
        status: ConflictStatus::Unresolved,
        resolved_text: None,
        detected_at: millis_to_datetime(Utc::now().timestamp_millis()),
        resolved_at: None,
    }
}

pub fn store_conflict(conn: &Connection, conflict: &ConflictRecord) -> Result<(), StoreError> {
    let hunks = serde_json::to_string(&conflict.hunks)?;

    conn.execute(
        r#"
        INSERT OR REPLACE INTO conflicts
        (id, document_id, field, base_text, theirs_text, yours_text, merged_text,
         hunks, status, resolved_text, detected_at, resolved_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            conflict.id,
            conflict.document_id,
            conflict.field.as_str(),
            conflict.base,
            conflict.theirs,
            conflict.yours,
            conflict.merged,
            hunks,
            conflict.status.as_str(),
            conflict.resolved_text,
            conflict.detected_at.timestamp_millis(),
            conflict.resolved_at.map(|t| t.timestamp_millis()),
        ],
    )?;

    Ok(())
}

const CONFLICT_COLUMNS: &str = "id, document_id, field, base_text, theirs_text, yours_text, \
     merged_text, hunks, status, resolved_text, detected_at, resolved_at";

/// Row plus its raw hunks column; hunks are decoded by [`with_hunks`] so a
/// corrupt column surfaces as a [`StoreError::Serialization`].
fn row_to_conflict(row: &Row<'_>) -> rusqlite::Result<(ConflictRecord, String)> {
    let hunks: String = row.get(7)?;

    let conflict = ConflictRecord {
        id: row.get(0)?,
        document_id: row.get(1)?,
        field: Field::parse(&row.get::<_, String>(2)?),
        base: row.get(3)?,
        theirs: row.get(4)?,
        yours: row.get(5)?,
        merged: row.get(6)?,
        hunks: Vec::new(),
        status: ConflictStatus::parse(&row.get::<_, String>(8)?),
        resolved_text: row.get(9)?,
        detected_at: millis_to_datetime(row.get(10)?),
        resolved_at: row.get::<_, Option<i64>>(11)?.map(millis_to_datetime),
    };
    Ok((conflict, hunks))
}

fn with_hunks(
    (mut conflict, hunks): (ConflictRecord, String),
) -> Result<ConflictRecord, StoreError> {
    conflict.hunks = serde_json::from_str::<Vec<Hunk>>(&hunks)?;
    Ok(conflict)
}

/// Unresolved conflicts, newest first, optionally for one document
pub fn get_unresolved_conflicts(
    conn: &Connection,
    document_id: Option<&str>,
) -> Result<Vec<ConflictRecord>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONFLICT_COLUMNS}
         FROM conflicts
         WHERE status = 'unresolved' AND (?1 IS NULL OR document_id = ?1)
         ORDER BY detected_at DESC"
    ))?;

    let rows = stmt
        .query_map([document_id], row_to_conflict)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(with_hunks).collect()
}

pub fn get_conflict(conn: &Connection, conflict_id: &str) -> Result<ConflictRecord, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE id = ?1"),
            [conflict_id],
            row_to_conflict,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            id: conflict_id.to_string(),
        })?;
    with_hunks(row)
}

/// Mark a conflict resolved. The chosen text is kept with the record; applying
/// it to the document is a normal versioned save by the caller.
pub fn resolve_conflict(
    conn: &Connection,
    conflict_id: &str,
    resolution: &ResolutionInput,
) -> Result<ConflictRecord, StoreError> {
    let conflict = get_conflict(conn, conflict_id)?;
    let resolved_text = match (resolution.resolution, &resolution.merged_text) {
        (ConflictStatus::ResolvedYours, _) => conflict.yours.clone(),
        (ConflictStatus::ResolvedTheirs, _) => conflict.theirs.clone(),
        (ConflictStatus::ResolvedMerged, Some(text)) => Some(text.clone()),
        (ConflictStatus::ResolvedMerged, None) => {
            return Err(StoreError::InvalidResolution(
                "resolved_merged requires mergedText".to_string(),
            ))
        }
        (ConflictStatus::Unresolved, _) => {
            return Err(StoreError::InvalidResolution(
                "a conflict cannot be resolved as unresolved".to_string(),
            ))
        }
    };
    let now = Utc::now().timestamp_millis();

    conn.execute(
        r#"
        UPDATE conflicts
        SET status = ?1, resolved_text = ?2, resolved_at = ?3
        WHERE id = ?4
        "#,
        params![resolution.resolution.as_str(), resolved_text, now, conflict_id],
    )?;

    get_conflict(conn, conflict_id)
}
