//! Review lifecycle for proposed edits.
//!
//! A suggestion starts `pending` and is resolved exactly once, to either
//! `accepted` or `rejected`. A `ReviewSession` keeps the document it was
//! opened on and derives the current content from the accepted set, so
//! suggestions can be resolved one at a time in any order while their
//! line numbers stay valid.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::document::Document;
use crate::edit::{
    BatchPolicy, EditError, EditOutcome, EditType, LineEdit, Targeted, apply_batch, apply_edit,
    verify_checksum,
};

/// Review state of a suggestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl SuggestionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Accepted => "accepted",
            SuggestionStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A line edit under review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSuggestion {
    pub id: String,
    #[serde(flatten)]
    pub edit: LineEdit,
    #[serde(default)]
    pub status: SuggestionStatus,
    /// Lines a delete removes, joined with `\n`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    /// Checksum of the document the suggestion was written against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_checksum: Option<String>,
}

impl EditSuggestion {
    /// Wrap an edit proposed against `document` as a pending suggestion
    pub fn new(edit: LineEdit, document: &Document) -> Self {
        let range = edit.range();
        let original = match edit.edit_type {
            EditType::Delete if range.fits(document.line_count()) => {
                Some(document.lines()[range.to_indices()].join("\n"))
            }
            _ => None,
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            edit,
            status: SuggestionStatus::Pending,
            original,
            base_checksum: Some(document.checksum()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn accept(&mut self) -> Result<(), ReviewError> {
        self.resolve(SuggestionStatus::Accepted)
    }

    pub fn reject(&mut self) -> Result<(), ReviewError> {
        self.resolve(SuggestionStatus::Rejected)
    }

    fn resolve(&mut self, status: SuggestionStatus) -> Result<(), ReviewError> {
        if self.status.is_terminal() {
            return Err(ReviewError::AlreadyResolved {
                id: self.id.clone(),
                status: self.status,
            });
        }
        debug!(id = %self.id, %status, "resolved suggestion");
        self.status = status;
        Ok(())
    }

    /// Check the lines a delete would remove against the recorded snapshot
    fn check_original(&self, removed: &[String]) -> Result<(), ReviewError> {
        match (&self.edit.edit_type, &self.original) {
            (EditType::Delete, Some(original)) if removed.join("\n") != *original => {
                Err(ReviewError::OriginalMismatch {
                    id: self.id.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Targeted for EditSuggestion {
    fn file_path(&self) -> &str {
        &self.edit.file_path
    }
}

/// Error types for review operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Suggestion {id} is already {status}")]
    AlreadyResolved { id: String, status: SuggestionStatus },

    #[error("Suggestion {id} has not been accepted")]
    NotAccepted { id: String },

    #[error("Suggestion {id} was written against a different document")]
    StaleDocument { id: String },

    /// Accepted suggestion with no record of the document it applies to
    #[error("Suggestion {id} is accepted but has no base checksum")]
    Unanchored { id: String },

    #[error("Suggestion {id} would delete lines that differ from its snapshot")]
    OriginalMismatch { id: String },

    #[error("Unknown suggestion: {0}")]
    UnknownSuggestion(String),

    #[error("Suggestion {id}: {source}")]
    Edit { id: String, source: EditError },
}

/// Apply one accepted suggestion to the document it was written against
///
/// Applying a suggestion to a document that already contains it fails
/// with `StaleDocument`, since the checksum no longer matches. A
/// suggestion without a base checksum cannot be told apart from one that
/// was already applied, so it fails with `Unanchored`.
pub fn apply_suggestion(
    document: &Document,
    suggestion: &EditSuggestion,
) -> Result<Document, ReviewError> {
    if suggestion.status != SuggestionStatus::Accepted {
        return Err(ReviewError::NotAccepted {
            id: suggestion.id.clone(),
        });
    }

    let Some(expected) = &suggestion.base_checksum else {
        return Err(ReviewError::Unanchored {
            id: suggestion.id.clone(),
        });
    };
    verify_checksum(document, expected).map_err(|_| ReviewError::StaleDocument {
        id: suggestion.id.clone(),
    })?;

    let result = apply_edit(document, &suggestion.edit).map_err(|source| ReviewError::Edit {
        id: suggestion.id.clone(),
        source,
    })?;
    suggestion.check_original(&result.removed)?;

    Ok(result.document)
}

/// Result of `ReviewSession::accept_all`
#[derive(Debug, Default)]
pub struct AcceptAllReport {
    /// Suggestions that were accepted
    pub accepted: Vec<String>,
    /// Suggestions left pending, with the reason
    pub failed: Vec<(String, ReviewError)>,
}

/// Review of the suggestions for one document
#[derive(Debug, Clone)]
pub struct ReviewSession {
    base: Document,
    current: Document,
    suggestions: Vec<EditSuggestion>,
}

impl ReviewSession {
    /// Open a review over `base`
    ///
    /// Suggestions without a base checksum are stamped with the checksum
    /// of `base`; accepted ones must already carry one. Suggestions
    /// already accepted are applied right away. Fails with
    /// `StaleDocument` when a suggestion carries a checksum of some
    /// other document, which is also what reopening a review on its own
    /// output gives.
    pub fn new(base: Document, mut suggestions: Vec<EditSuggestion>) -> Result<Self, ReviewError> {
        let checksum = base.checksum();
        for suggestion in &mut suggestions {
            match &suggestion.base_checksum {
                Some(c) if *c != checksum => {
                    return Err(ReviewError::StaleDocument {
                        id: suggestion.id.clone(),
                    });
                }
                Some(_) => {}
                None if suggestion.status == SuggestionStatus::Accepted => {
                    return Err(ReviewError::Unanchored {
                        id: suggestion.id.clone(),
                    });
                }
                None => suggestion.base_checksum = Some(checksum.clone()),
            }
        }

        let mut session = Self {
            current: base.clone(),
            base,
            suggestions,
        };
        session.current = session.render(&session.accepted_edits())?;
        Ok(session)
    }

    pub fn base(&self) -> &Document {
        &self.base
    }

    /// Base document with every accepted suggestion applied
    pub fn current(&self) -> &Document {
        &self.current
    }

    pub fn suggestions(&self) -> &[EditSuggestion] {
        &self.suggestions
    }

    pub fn into_parts(self) -> (Document, Vec<EditSuggestion>) {
        (self.current, self.suggestions)
    }

    pub fn pending(&self) -> impl Iterator<Item = &EditSuggestion> {
        self.suggestions
            .iter()
            .filter(|s| s.status == SuggestionStatus::Pending)
    }

    /// Check whether every suggestion has been resolved
    pub fn is_complete(&self) -> bool {
        self.pending().next().is_none()
    }

    fn position(&self, id: &str) -> Result<usize, ReviewError> {
        self.suggestions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ReviewError::UnknownSuggestion(id.to_string()))
    }

    fn accepted_edits(&self) -> Vec<(usize, LineEdit)> {
        self.suggestions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status == SuggestionStatus::Accepted)
            .map(|(idx, s)| (idx, s.edit.clone()))
            .collect()
    }

    /// Apply `edits` to the base, refusing anything that does not apply cleanly
    fn render(&self, edits: &[(usize, LineEdit)]) -> Result<Document, ReviewError> {
        let batch: Vec<LineEdit> = edits.iter().map(|(_, edit)| edit.clone()).collect();
        let result = apply_batch(&self.base, &batch, BatchPolicy::AbortOnInvalid).map_err(
            |(index, source)| ReviewError::Edit {
                id: self.suggestions[edits[index].0].id.clone(),
                source,
            },
        )?;

        for ((idx, _), outcome) in edits.iter().zip(&result.outcomes) {
            if let EditOutcome::Applied { removed, .. } = outcome {
                self.suggestions[*idx].check_original(removed)?;
            }
        }

        Ok(result.document)
    }

    /// Accept a pending suggestion and apply it to the current document
    ///
    /// The suggestion stays pending when it does not apply cleanly next
    /// to the suggestions accepted so far.
    pub fn accept(&mut self, id: &str) -> Result<&Document, ReviewError> {
        let idx = self.position(id)?;
        let mut candidate = self.suggestions[idx].clone();
        candidate.accept()?;

        let mut edits = self.accepted_edits();
        edits.push((idx, candidate.edit.clone()));
        self.current = self.render(&edits)?;
        self.suggestions[idx] = candidate;

        info!(id, lines = self.current.line_count(), "accepted suggestion");
        Ok(&self.current)
    }

    /// Reject a pending suggestion; the document is unchanged
    pub fn reject(&mut self, id: &str) -> Result<(), ReviewError> {
        let idx = self.position(id)?;
        self.suggestions[idx].reject()?;
        info!(id, "rejected suggestion");
        Ok(())
    }

    /// Accept every pending suggestion in order
    pub fn accept_all(&mut self) -> AcceptAllReport {
        let ids: Vec<String> = self.pending().map(|s| s.id.clone()).collect();
        let mut report = AcceptAllReport::default();
        for id in ids {
            match self.accept(&id) {
                Ok(_) => report.accepted.push(id),
                Err(error) => report.failed.push((id, error)),
            }
        }
        report
    }
}
