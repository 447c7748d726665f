// src/hunks.rs
// Line hunks between the server's text and the editor's text of a conflicted field.
// Uses the `similar` crate for the line diff.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkKind {
    /// Lines only the editor has
    Add,
    /// Lines only the server has
    Delete,
    Modify,
}

/// A contiguous block of lines where the two sides disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hunk {
    pub kind: HunkKind,

    /// Zero-based line in `theirs` where the block starts
    pub theirs_start_line: usize,

    pub theirs_text: String,
    pub yours_text: String,
}

/// Calculate hunks turning `theirs` into `yours`.
pub fn calculate_hunks(theirs: &str, yours: &str) -> Vec<Hunk> {
    let diff = TextDiff::from_lines(theirs, yours);
    let mut hunks = Vec::new();

    let mut line_cursor = 0;
    let mut block_start = 0;
    let mut pending_deletes = String::new();
    let mut pending_inserts = String::new();
    let mut in_block = false;

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal => {
                if in_block {
                    flush_block(&mut hunks, &pending_deletes, &pending_inserts, block_start);
                    pending_deletes.clear();
                    pending_inserts.clear();
                    in_block = false;
                }
                line_cursor += 1;
            }
            ChangeTag::Delete => {
                if !in_block {
                    in_block = true;
                    block_start = line_cursor;
                }
                pending_deletes.push_str(change.value());
                line_cursor += 1;
            }
            ChangeTag::Insert => {
                if !in_block {
                    // Pure insert; block starts at the insertion point
                    in_block = true;
                    block_start = line_cursor;
                }
                pending_inserts.push_str(change.value());
            }
        }
    }

    if in_block {
        flush_block(&mut hunks, &pending_deletes, &pending_inserts, block_start);
    }

    hunks
}

fn flush_block(hunks: &mut Vec<Hunk>, deletes: &str, inserts: &str, start_line: usize) {
    let kind = match (deletes.is_empty(), inserts.is_empty()) {
        (true, true) => return,
        (true, false) => HunkKind::Add,
        (false, true) => HunkKind::Delete,
        (false, false) => HunkKind::Modify,
    };

    hunks.push(Hunk {
        kind,
        theirs_start_line: start_line,
        theirs_text: deletes.to_string(),
        yours_text: inserts.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts() {
        let text = "line 1\nline 2\nline 3";
        assert!(calculate_hunks(text, text).is_empty());
    }

    #[test]
    fn test_single_modified_line() {
        let theirs = "intro\nsteps to reproduce\noutro\n";
        let yours = "intro\nsteps to reproduce on macOS\noutro\n";
        let hunks = calculate_hunks(theirs, yours);

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].kind, HunkKind::Modify);
        assert_eq!(hunks[0].theirs_start_line, 1);
        assert_eq!(hunks[0].theirs_text, "steps to reproduce\n");
        assert_eq!(hunks[0].yours_text, "steps to reproduce on macOS\n");
    }

    #[test]
    fn test_added_and_removed_blocks() {
        let theirs = "a\nb\nc\n";
        let yours = "a\nc\nd\n";
        let hunks = calculate_hunks(theirs, yours);

        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].kind, HunkKind::Delete);
        assert_eq!(hunks[0].theirs_text, "b\n");
        assert_eq!(hunks[1].kind, HunkKind::Add);
        assert_eq!(hunks[1].theirs_start_line, 3);
        assert_eq!(hunks[1].yours_text, "d\n");
    }
}
