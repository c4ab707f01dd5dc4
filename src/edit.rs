use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::position::{LineRange, Position};

/// Kind of mutation a line edit performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditType {
    /// Add new lines before `position.line`
    Insert,
    /// Remove `originalLineCount` lines starting at `position.line`
    Delete,
    /// Swap `originalLineCount` lines starting at `position.line` for new content
    Replace,
}

impl std::fmt::Display for EditType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EditType::Insert => "insert",
            EditType::Delete => "delete",
            EditType::Replace => "replace",
        };
        f.write_str(name)
    }
}

/// A proposed line-level mutation to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEdit {
    pub edit_type: EditType,
    /// New text; required for insert and replace, absent for delete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Target line (1-indexed) in the original numbering of the document
    pub position: Position,
    /// Number of existing lines removed by delete or replace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_line_count: Option<usize>,
    /// Human-readable rationale
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub explanation: String,
    /// File the edit targets
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,
}

impl LineEdit {
    pub fn insert(line: usize, content: impl Into<String>) -> Self {
        Self::new(EditType::Insert, line, None, Some(content.into()))
    }

    pub fn delete(line: usize, count: usize) -> Self {
        Self::new(EditType::Delete, line, Some(count), None)
    }

    pub fn replace(line: usize, count: usize, content: impl Into<String>) -> Self {
        Self::new(EditType::Replace, line, Some(count), Some(content.into()))
    }

    fn new(
        edit_type: EditType,
        line: usize,
        original_line_count: Option<usize>,
        content: Option<String>,
    ) -> Self {
        Self {
            edit_type,
            content,
            position: Position::new(line),
            original_line_count,
            explanation: String::new(),
            file_path: String::new(),
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn for_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Lines covered by the edit in the original numbering
    ///
    /// Inserts cover an empty range at their target line.
    pub fn range(&self) -> LineRange {
        let count = match self.edit_type {
            EditType::Insert => 0,
            EditType::Delete | EditType::Replace => self.original_line_count.unwrap_or(0),
        };
        LineRange::new(self.position.line, count)
    }

    /// Lines the edit writes into the document
    ///
    /// Content is split on `\n`; a single trailing newline is dropped, so
    /// `"c\n"` yields one line and `""` yields one empty line.
    pub fn content_lines(&self) -> Vec<String> {
        match (self.edit_type, self.content.as_deref()) {
            (EditType::Delete, _) | (_, None) => Vec::new(),
            (_, Some(content)) => {
                let body = content.strip_suffix('\n').unwrap_or(content);
                body.split('\n')
                    .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                    .collect()
            }
        }
    }

    /// Check the edit's shape, independent of any document
    pub fn validate(&self) -> Result<(), EditError> {
        let invalid = |reason: &str| EditError::InvalidEdit {
            edit_type: self.edit_type,
            reason: reason.to_string(),
        };

        match self.edit_type {
            EditType::Insert => {
                if self.content.is_none() {
                    return Err(invalid("content is required"));
                }
                if self.original_line_count.is_some_and(|count| count != 0) {
                    return Err(invalid("originalLineCount must be 0 or absent"));
                }
            }
            EditType::Delete => {
                if self.content.is_some() {
                    return Err(invalid("content must be absent"));
                }
                if self.original_line_count.unwrap_or(0) == 0 {
                    return Err(invalid("originalLineCount must be at least 1"));
                }
            }
            EditType::Replace => {
                if self.content.is_none() {
                    return Err(invalid("content is required"));
                }
                if self.original_line_count.unwrap_or(0) == 0 {
                    return Err(invalid("originalLineCount must be at least 1"));
                }
            }
        }

        Ok(())
    }

    /// Validate the edit against a document of `line_count` lines
    ///
    /// Returns the range the edit covers when it may be applied.
    pub fn check(&self, line_count: usize) -> Result<LineRange, EditError> {
        self.validate()?;

        let range = self.range();
        if !range.fits(line_count) {
            return Err(EditError::OutOfRangePosition {
                line: self.position.line,
                count: range.len(),
                line_count,
            });
        }
        Ok(range)
    }
}

/// Anything that names the file it targets
pub trait Targeted {
    fn file_path(&self) -> &str;
}

impl Targeted for LineEdit {
    fn file_path(&self) -> &str {
        &self.file_path
    }
}

/// Partition a multi-file batch by target file, keeping input order per file
pub fn group_by_file<T: Targeted + Clone>(items: &[T]) -> BTreeMap<String, Vec<T>> {
    let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for item in items {
        groups
            .entry(item.file_path().to_string())
            .or_default()
            .push(item.clone());
    }
    groups
}

/// What to do with a batch once an edit fails validation or conflicts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum BatchPolicy {
    /// Report the failing edit and keep going
    #[default]
    #[serde(rename = "skip")]
    #[value(name = "skip")]
    SkipInvalid,
    /// Stop at the first failing edit and leave the document untouched
    #[serde(rename = "abort")]
    #[value(name = "abort")]
    AbortOnInvalid,
}

/// Result of applying one edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResult {
    /// Document after the edit
    pub document: Document,
    /// Lines removed by the edit
    pub removed: Vec<String>,
    /// Change in line count (positive = document grew)
    pub line_shift: i64,
}

/// Outcome of a single edit within a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Edit was applied
    Applied {
        /// Target line in the original numbering
        line: usize,
        /// Lines the edit removed
        removed: Vec<String>,
        /// Number of lines the edit wrote
        inserted: usize,
    },
    /// Edit failed validation and was not applied
    SkippedInvalid { error: EditError },
    /// Edit overlaps an earlier edit of the batch and was not applied
    Conflict {
        /// Index of the earlier edit
        with: usize,
    },
}

/// Result of applying a batch of edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Document after all applied edits
    pub document: Document,
    /// Per-edit outcomes, in input order
    pub outcomes: Vec<EditOutcome>,
    /// Checksum of the resulting document
    pub final_checksum: String,
    /// Total change in line count
    pub line_shift: i64,
    pub applied_count: usize,
    pub skipped_count: usize,
    pub conflict_count: usize,
}

impl BatchResult {
    fn new(document: Document, outcomes: Vec<EditOutcome>, line_shift: i64) -> Self {
        let applied_count = outcomes
            .iter()
            .filter(|o| matches!(o, EditOutcome::Applied { .. }))
            .count();
        let skipped_count = outcomes
            .iter()
            .filter(|o| matches!(o, EditOutcome::SkippedInvalid { .. }))
            .count();
        let conflict_count = outcomes
            .iter()
            .filter(|o| matches!(o, EditOutcome::Conflict { .. }))
            .count();

        Self {
            final_checksum: document.checksum(),
            document,
            outcomes,
            line_shift,
            applied_count,
            skipped_count,
            conflict_count,
        }
    }

    /// Check if every edit of the batch was applied
    pub fn is_complete_success(&self) -> bool {
        self.applied_count == self.outcomes.len()
    }
}

/// Error types for edit operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// Edit violates the shape rules of its type
    #[error("Invalid {edit_type} edit: {reason}")]
    InvalidEdit { edit_type: EditType, reason: String },

    /// Target lines fall outside the document
    #[error("Line {line} (+{count}) out of range for a document of {line_count} line(s)")]
    OutOfRangePosition {
        line: usize,
        count: usize,
        line_count: usize,
    },

    /// Edit overlaps an earlier edit of the same batch
    #[error("Edit #{index} conflicts with edit #{other}")]
    Conflict { index: usize, other: usize },

    /// Document is not the one the batch was written against
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Batch stopped at the first failing edit
    #[error("Batch aborted at edit #{index}: {source}")]
    BatchAborted {
        index: usize,
        source: Box<EditError>,
    },
}

/// Verify that a document matches the expected checksum
pub fn verify_checksum(document: &Document, expected_checksum: &str) -> Result<(), EditError> {
    let actual = document.checksum();
    if actual == expected_checksum {
        Ok(())
    } else {
        Err(EditError::ChecksumMismatch {
            expected: expected_checksum.to_string(),
            actual,
        })
    }
}

fn splice_edit(document: &mut Document, edit: &LineEdit, range: LineRange) -> (Vec<String>, usize) {
    let inserted = edit.content_lines();
    let inserted_count = inserted.len();
    let removed = document.splice(range.to_indices(), inserted);
    (removed, inserted_count)
}

/// Apply a single edit to a document
pub fn apply_edit(document: &Document, edit: &LineEdit) -> Result<EditResult, EditError> {
    let range = edit.check(document.line_count())?;

    let mut updated = document.clone();
    let (removed, inserted) = splice_edit(&mut updated, edit, range);
    let line_shift = inserted as i64 - removed.len() as i64;

    Ok(EditResult {
        document: updated,
        removed,
        line_shift,
    })
}

/// Order edit indices by target line, highest first
///
/// Applying from the bottom of the document upward keeps the original
/// line numbers of the remaining edits valid.
pub fn sort_edits_descending(edits: &[LineEdit]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..edits.len()).collect();
    order.sort_by(|&a, &b| edits[b].position.line.cmp(&edits[a].position.line));
    order
}

/// Apply an ordered batch of edits written against the original numbering
///
/// Each edit is validated against the input document. An edit whose
/// range conflicts with an earlier surviving edit is reported as a
/// conflict. Surviving edits are applied bottom-up. Under
/// `BatchPolicy::AbortOnInvalid` the first invalid or conflicting edit
/// fails the whole call instead.
pub fn apply_edits(
    document: &Document,
    edits: &[LineEdit],
    policy: BatchPolicy,
    expected_checksum: Option<&str>,
) -> Result<BatchResult, EditError> {
    if let Some(expected) = expected_checksum {
        verify_checksum(document, expected)?;
    }

    apply_batch(document, edits, policy).map_err(|(index, source)| EditError::BatchAborted {
        index,
        source: Box::new(source),
    })
}

/// Batch application without the checksum check
///
/// Under `BatchPolicy::AbortOnInvalid` the error carries the index of the
/// first failing edit.
pub(crate) fn apply_batch(
    document: &Document,
    edits: &[LineEdit],
    policy: BatchPolicy,
) -> Result<BatchResult, (usize, EditError)> {
    let line_count = document.line_count();
    let mut outcomes: Vec<Option<EditOutcome>> = vec![None; edits.len()];
    let mut surviving: Vec<Option<LineRange>> = vec![None; edits.len()];

    for (index, edit) in edits.iter().enumerate() {
        let range = match edit.check(line_count) {
            Ok(range) => range,
            Err(error) => {
                if policy == BatchPolicy::AbortOnInvalid {
                    return Err((index, error));
                }
                debug!(index, %error, "skipping invalid edit");
                outcomes[index] = Some(EditOutcome::SkippedInvalid { error });
                continue;
            }
        };

        let earlier = surviving[..index]
            .iter()
            .position(|r| r.is_some_and(|r| r.conflicts_with(&range)));
        if let Some(other) = earlier {
            if policy == BatchPolicy::AbortOnInvalid {
                return Err((index, EditError::Conflict { index, other }));
            }
            warn!(index, other, "edit conflicts with an earlier edit");
            outcomes[index] = Some(EditOutcome::Conflict { with: other });
            continue;
        }

        surviving[index] = Some(range);
    }

    // Surviving edits never share a start line, so the order is total.
    let mut updated = document.clone();
    let mut line_shift = 0i64;
    for index in sort_edits_descending(edits) {
        let Some(range) = surviving[index] else {
            continue;
        };
        let (removed, inserted) = splice_edit(&mut updated, &edits[index], range);
        line_shift += inserted as i64 - removed.len() as i64;
        debug!(index, %range, inserted, removed = removed.len(), "applied edit");
        outcomes[index] = Some(EditOutcome::Applied {
            line: range.start,
            removed,
            inserted,
        });
    }

    let result = BatchResult::new(updated, outcomes.into_iter().flatten().collect(), line_shift);
    info!(
        applied = result.applied_count,
        skipped = result.skipped_count,
        conflicts = result.conflict_count,
        "applied edit batch"
    );
    Ok(result)
}
