// Line positions and ranges
pub mod position;

// Line-oriented documents
pub mod document;

// Edit engine
pub mod edit;

// Suggestion review
pub mod suggestion;

// JSON wire types and execution log
pub mod json;

// Remote collaborators
pub mod error;
pub mod session;
pub mod store;
pub mod template;

pub mod config;

// Re-exports
pub use position::{LineRange, Position, byte_to_position};
pub use document::{Document, FileContent, FileError, LineEnding, checksum, read_file};
pub use edit::{
    BatchPolicy, BatchResult, EditError, EditOutcome, EditResult, EditType, LineEdit, Targeted,
    apply_edit, apply_edits, group_by_file, sort_edits_descending, verify_checksum,
};
pub use suggestion::{
    AcceptAllReport, EditSuggestion, ReviewError, ReviewSession, SuggestionStatus,
    apply_suggestion,
};
pub use json::{
    ApplyRequest, ApplyResponse, ExecutionLog, ExecutionLogEntry, PerEditResultJson,
    ReviewFailure, ReviewReport, ReviewRequest, generate_execution_id,
};
pub use session::{
    CallbackOutcome, HttpSessionProvider, Session, SessionProvider, User, handle_callback,
    sanitize_next,
};
pub use store::{DocumentStore, DocumentStoreClient, NewProject, Project, SaveDocument, StoredDocument};
pub use template::{TemplateConfig, TemplateFile, TemplateRegistry};
pub use config::Config;
