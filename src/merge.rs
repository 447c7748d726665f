// src/merge.rs
//! Whole-field three-way merge.
//!
//! Title and description are merged independently. A field is taken from
//! whichever side changed it; when both sides changed it to different text,
//! the result embeds both versions between conflict markers so that neither
//! edit is lost.

use serde::{Deserialize, Serialize};

pub const MARKER_YOURS: &str = "<<<<<<< yours";
pub const MARKER_SEPARATOR: &str = "=======";
pub const MARKER_THEIRS: &str = ">>>>>>> theirs";

/// Outcome of merging one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub text: Option<String>,
    pub had_conflict: bool,
}

impl MergeResult {
    fn clean(text: Option<&str>) -> Self {
        Self {
            text: text.map(str::to_string),
            had_conflict: false,
        }
    }
}

/// Merge `yours` and `theirs` against their common ancestor `base`.
///
/// Absent text compares equal to the empty string, but the value handed back
/// is the caller's own (`None` stays `None`).
pub fn merge3(base: Option<&str>, theirs: Option<&str>, yours: Option<&str>) -> MergeResult {
    let b = base.unwrap_or("");
    let t = theirs.unwrap_or("");
    let y = yours.unwrap_or("");

    if t == b && y != b {
        return MergeResult::clean(yours);
    }
    if y == b && t != b {
        return MergeResult::clean(theirs);
    }
    if t == y {
        return MergeResult::clean(yours);
    }

    MergeResult {
        text: Some(conflict_text(y, t)),
        had_conflict: true,
    }
}

/// Convenience for non-nullable fields such as the title
pub fn merge_text(base: &str, theirs: &str, yours: &str) -> MergeResult {
    merge3(Some(base), Some(theirs), Some(yours))
}

fn conflict_text(yours: &str, theirs: &str) -> String {
    format!("{MARKER_YOURS}\n{yours}\n{MARKER_SEPARATOR}\n{theirs}\n{MARKER_THEIRS}")
}

/// True when `text` still contains a full set of unresolved markers
pub fn has_conflict_markers(text: &str) -> bool {
    let mut lines = text.lines();
    lines.any(|l| l == MARKER_YOURS)
        && lines.any(|l| l == MARKER_SEPARATOR)
        && lines.any(|l| l == MARKER_THEIRS)
}
