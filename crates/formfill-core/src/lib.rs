//! Form-field discovery and edit staging for fillable documents.
//!
//! This crate is the engine behind natural-language form filling: it
//! discovers fillable fields and their semantic context in a document,
//! stages proposed edits inside a per-conversation session, commits them
//! best-effort with per-field outcome reporting, and reconciles committed
//! values across the turns of a multi-turn conversation.
//!
//! The underlying document format is abstracted behind the
//! [`engine::DocumentEngine`] capability; see the `formfill-pdf` crate for
//! the lopdf-backed implementation.

pub mod commit;
pub mod engine;
pub mod error;
pub mod extract;
pub mod field;
pub mod label;
pub mod mapper;
pub mod orchestrator;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use commit::{default_output_path, AppliedEdit, CommitOutcome};
pub use engine::{DocumentEngine, DocumentHandle, EngineError, Rect, Widget, WidgetKind, WidgetValue};
pub use error::{ExtractError, MapperError, SessionError};
pub use extract::{detect_form_fields, extract_fields, CONTEXT_LINES, CONTEXT_RADIUS};
pub use field::{coerce_checkbox_value, field_id_for, DetectedField, FieldEdit, FieldType, FieldValue};
pub use label::label_for;
pub use mapper::{InstructionMapper, KeywordMapper};
pub use orchestrator::{begin_turn, TurnRequest, TurnSummary};
pub use session::{
    lock_session, FieldDetails, FormSession, PendingEdit, SessionRegistry, SharedSession,
    StageOutcome, StagedEdit,
};
