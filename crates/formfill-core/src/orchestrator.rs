//! Per-turn orchestration: fresh form-filling task vs continuation.
//!
//! Whether a turn continues the conversation is an explicit caller
//! decision, never inferred. On a continuation the caller passes the path
//! of the previously saved output together with its persisted record of
//! applied edits; the orchestrator seeds the session from that record
//! before any staging happens.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::DocumentEngine;
use crate::error::SessionError;
use crate::field::FieldValue;
use crate::session::FormSession;

#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    /// Document to open for this turn. For a continuation this must be the
    /// previous turn's saved output, not the original form.
    pub document_path: PathBuf,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub continuation: bool,
    /// Committed edits from earlier turns, persisted by the caller.
    #[serde(default)]
    pub previous_edits: Option<BTreeMap<String, FieldValue>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnSummary {
    pub field_count: usize,
    /// Applied edits carried into this turn from earlier ones.
    pub carried_edits: usize,
    pub continuation: bool,
}

/// Prepare a session for an incoming turn.
///
/// An unreadable `document_path` surfaces as an error; there is no
/// silent fallback to the original document.
pub fn begin_turn(
    session: &mut FormSession,
    engine: &dyn DocumentEngine,
    request: TurnRequest,
) -> Result<TurnSummary, SessionError> {
    if request.continuation {
        session.soft_reset();
        session.set_continuation(true);
        if let Some(previous) = request.previous_edits {
            session.seed_applied(previous);
        }
    } else {
        session.hard_reset();
    }

    session.set_output_path(request.output_path);
    let field_count = session.load_path(engine, &request.document_path)?;

    let summary = TurnSummary {
        field_count,
        carried_edits: session.applied_edits().len(),
        continuation: request.continuation,
    };
    info!(
        "turn started: {} fields, {} carried edits, continuation={}",
        summary.field_count, summary.carried_edits, summary.continuation
    );
    Ok(summary)
}
