use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::edit::{BatchResult, EditOutcome, LineEdit};
use crate::suggestion::{ReviewError, ReviewSession};

fn auto_execution_id() -> String {
    "auto".to_string()
}

/// Batch of edits to apply to one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    /// Caller-chosen id, or "auto" to generate one
    #[serde(default = "auto_execution_id")]
    pub execution_id: String,
    /// Checksum the file must have before any edit is applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_checksum: Option<String>,
    pub edits: Vec<LineEdit>,
}

impl ApplyRequest {
    /// Resolve "auto" to a fresh execution id
    pub fn resolved_execution_id(&self) -> String {
        if self.execution_id == "auto" {
            generate_execution_id()
        } else {
            self.execution_id.clone()
        }
    }
}

/// Review decisions for the suggestions of one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Suggestion ids to accept, in order
    #[serde(default)]
    pub accept: Vec<String>,
    /// Suggestion ids to reject
    #[serde(default)]
    pub reject: Vec<String>,
    /// Accept every suggestion still pending afterwards
    #[serde(default)]
    pub accept_all: bool,
}

impl ReviewRequest {
    /// Apply the decisions to `session`: rejections, then acceptances,
    /// then accept-all
    pub fn run(&self, session: &mut ReviewSession) -> ReviewReport {
        let mut report = ReviewReport::default();

        for id in &self.reject {
            match session.reject(id) {
                Ok(()) => report.rejected.push(id.clone()),
                Err(error) => report.fail(id, &error),
            }
        }
        for id in &self.accept {
            match session.accept(id) {
                Ok(_) => report.accepted.push(id.clone()),
                Err(error) => report.fail(id, &error),
            }
        }
        if self.accept_all {
            let all = session.accept_all();
            report.accepted.extend(all.accepted);
            for (id, error) in &all.failed {
                report.fail(id, error);
            }
        }

        report
    }
}

/// Decision that could not be carried out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFailure {
    pub id: String,
    pub reason: String,
}

/// Outcome of a `ReviewRequest`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub failed: Vec<ReviewFailure>,
}

impl ReviewReport {
    fn fail(&mut self, id: &str, error: &ReviewError) {
        self.failed.push(ReviewFailure {
            id: id.to_string(),
            reason: error.to_string(),
        });
    }
}

/// Outcome of one edit, as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerEditResultJson {
    /// Index of the edit in the request
    pub index: usize,
    /// Target line of the edit
    pub line: usize,
    /// "applied", "skipped" or "conflict"
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PerEditResultJson {
    pub fn from_outcome(index: usize, edit: &LineEdit, outcome: &EditOutcome) -> Self {
        let base = Self {
            index,
            line: edit.position.line,
            status: String::new(),
            removed: None,
            inserted: None,
            reason: None,
        };
        match outcome {
            EditOutcome::Applied {
                removed, inserted, ..
            } => Self {
                status: "applied".to_string(),
                removed: Some(removed.len()),
                inserted: Some(*inserted),
                ..base
            },
            EditOutcome::SkippedInvalid { error } => Self {
                status: "skipped".to_string(),
                reason: Some(error.to_string()),
                ..base
            },
            EditOutcome::Conflict { with } => Self {
                status: "conflict".to_string(),
                reason: Some(format!("overlaps edit #{}", with)),
                ..base
            },
        }
    }
}

/// Response of an apply run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub execution_id: String,
    pub success: bool,
    #[serde(default)]
    pub final_checksum: String,
    #[serde(default)]
    pub line_shift: i64,
    #[serde(default)]
    pub applied_count: usize,
    #[serde(default)]
    pub skipped_count: usize,
    #[serde(default)]
    pub conflict_count: usize,
    #[serde(default)]
    pub edits: Vec<PerEditResultJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyResponse {
    pub fn success(execution_id: String, edits: &[LineEdit], result: &BatchResult) -> Self {
        let per_edit = edits
            .iter()
            .zip(&result.outcomes)
            .enumerate()
            .map(|(index, (edit, outcome))| PerEditResultJson::from_outcome(index, edit, outcome))
            .collect();

        Self {
            execution_id,
            success: true,
            final_checksum: result.final_checksum.clone(),
            line_shift: result.line_shift,
            applied_count: result.applied_count,
            skipped_count: result.skipped_count,
            conflict_count: result.conflict_count,
            edits: per_edit,
            error: None,
        }
    }

    pub fn failure(execution_id: String, error: String) -> Self {
        Self {
            execution_id,
            success: false,
            final_checksum: String::new(),
            line_shift: 0,
            applied_count: 0,
            skipped_count: 0,
            conflict_count: 0,
            edits: Vec::new(),
            error: Some(error),
        }
    }

    /// Human-readable summary
    pub fn render_text(&self) -> String {
        if !self.success {
            return format!("Error: {}", self.error.as_deref().unwrap_or("Unknown error"));
        }

        let mut out = format!(
            "Applied {} edit(s)\nFinal checksum: {}\nLine shift: {}",
            self.applied_count, self.final_checksum, self.line_shift
        );
        for edit in self.edits.iter().filter(|e| e.status != "applied") {
            out.push_str(&format!(
                "\n  edit #{} (line {}) {}: {}",
                edit.index,
                edit.line,
                edit.status,
                edit.reason.as_deref().unwrap_or("")
            ));
        }
        out
    }
}

/// Generate a unique execution id
pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One applied batch, as recorded in the execution log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub execution_id: String,
    pub timestamp: DateTime<Utc>,
    pub file: String,
    pub checksum_before: String,
    pub checksum_after: String,
    pub applied_count: usize,
    pub skipped_count: usize,
    pub conflict_count: usize,
}

/// Append-only JSON-lines log of apply runs
pub struct ExecutionLog;

impl ExecutionLog {
    pub fn append<P: AsRef<Path>>(path: P, entry: &ExecutionLogEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry).map_err(io::Error::other)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)
    }

    /// Read every entry; a missing log reads as empty
    pub fn read<P: AsRef<Path>>(path: P) -> io::Result<Vec<ExecutionLogEntry>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line).map_err(io::Error::other)?);
        }
        Ok(entries)
    }
}
