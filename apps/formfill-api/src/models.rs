//! Data models for the FormFill API

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use formfill_core::{
    CommitOutcome, DetectedField, FieldEdit, FieldType, FieldValue, PendingEdit, StageOutcome,
    TurnSummary,
};

fn default_true() -> bool {
    true
}

/// Field shape exposed at every serialization boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub field_id: String,
    pub field_type: FieldType,
    pub page: usize,
    pub label_context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl FieldInfo {
    pub fn from_field(field: &DetectedField) -> Self {
        Self {
            field_id: field.field_id.clone(),
            field_type: field.field_type,
            page: field.page,
            label_context: field.label_context.clone(),
            current_value: field.current_value.clone(),
            options: field.options.clone(),
        }
    }

    /// Same view with an overriding effective value (committed edits win
    /// over what extraction read).
    pub fn with_value(field: &DetectedField, value: Option<String>) -> Self {
        Self {
            current_value: value,
            ..Self::from_field(field)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub pdf_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub message: String,
    pub document_hash: String,
    pub fields: Vec<FieldInfo>,
    pub field_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillRequest {
    pub pdf_base64: String,
    pub instructions: String,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// Set to false to use simple keyword mapping instead of the LLM.
    #[serde(default = "default_true")]
    pub use_llm: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillResponse {
    pub success: bool,
    pub message: String,
    pub commit: CommitOutcome,
    pub filled_pdf_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub message: String,
    pub fields: Vec<FieldInfo>,
    pub edits: Vec<FieldEdit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub pdf_base64: String,
    #[serde(default)]
    pub document_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub document_hash: String,
    pub field_count: usize,
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnBody {
    /// Instructions for this turn; when present the turn is mapped,
    /// staged and committed in one go.
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub continuation: bool,
    #[serde(default)]
    pub previous_edits: Option<BTreeMap<String, FieldValue>>,
    /// Document to open; defaults to the previous turn's output on a
    /// continuation, the originally uploaded document otherwise.
    #[serde(default)]
    pub document_path: Option<PathBuf>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub use_llm: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub success: bool,
    pub summary: TurnSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_outcomes: Option<Vec<StageOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageRequest {
    pub edits: Vec<FieldEdit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageResponse {
    pub outcomes: Vec<StageOutcome>,
    pub pending_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingResponse {
    pub pending_edits: Vec<PendingEdit>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRequest {
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}
