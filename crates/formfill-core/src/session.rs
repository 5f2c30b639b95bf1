//! Edit session state machine.
//!
//! A [`FormSession`] holds the field snapshot of the currently open
//! document, the edits staged for the next commit, and the cumulative
//! record of everything committed across the turns of one conversation.
//! Sessions are handed out by [`SessionRegistry`] as mutex-guarded handles
//! keyed by conversation id; the mutex serializes interleaved `stage`
//! calls within a turn and excludes a commit from running concurrently
//! with anything else on the same session.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{DocumentEngine, DocumentHandle};
use crate::error::SessionError;
use crate::extract::extract_fields;
use crate::field::{coerce_checkbox_value, DetectedField, FieldEdit, FieldType, FieldValue};
use crate::label::label_for;

const REVIEW_CONTEXT_LEN: usize = 80;

/// Session state for one form-filling conversation.
pub struct FormSession {
    pub(crate) fields: Vec<DetectedField>,
    pub(crate) pending_edits: BTreeMap<String, FieldValue>,
    pub(crate) applied_edits: BTreeMap<String, FieldValue>,
    pub(crate) document: Option<Box<dyn DocumentHandle>>,
    pub(crate) source_path: Option<PathBuf>,
    pub(crate) output_path: Option<PathBuf>,
    pub(crate) saved_bytes: Option<Vec<u8>>,
    pub(crate) last_output: Option<PathBuf>,
    pub(crate) continuation: bool,
}

/// Result of staging a single edit.
#[derive(Debug, Clone, Serialize)]
pub struct StagedEdit {
    pub field_id: String,
    pub value: FieldValue,
    pub pending_count: usize,
}

/// Per-edit outcome of a batch stage. A bad id never aborts the batch.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub field_id: String,
    pub staged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A staged edit decorated for review.
#[derive(Debug, Clone, Serialize)]
pub struct PendingEdit {
    pub field_id: String,
    pub value: FieldValue,
    pub field_type: Option<FieldType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub label_context: String,
}

/// Full view of one field, merging staged and committed state.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDetails {
    pub field_id: String,
    pub field_type: FieldType,
    pub page: usize,
    pub label_context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<String>,
}

impl Default for FormSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FormSession {
    /// A fresh, empty session: no document, no fields, no edits.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            pending_edits: BTreeMap::new(),
            applied_edits: BTreeMap::new(),
            document: None,
            source_path: None,
            output_path: None,
            saved_bytes: None,
            last_output: None,
            continuation: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn fields(&self) -> &[DetectedField] {
        &self.fields
    }

    pub fn is_continuation(&self) -> bool {
        self.continuation
    }

    pub fn set_continuation(&mut self, continuation: bool) {
        self.continuation = continuation;
    }

    pub fn set_output_path(&mut self, path: Option<PathBuf>) {
        self.output_path = path;
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Destination of the most recent successful commit.
    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    /// Bytes of the most recent successful save, kept so a continuation
    /// turn can be served without re-uploading the document.
    pub fn saved_bytes(&self) -> Option<&[u8]> {
        self.saved_bytes.as_deref()
    }

    pub fn applied_edits(&self) -> &BTreeMap<String, FieldValue> {
        &self.applied_edits
    }

    pub fn pending_count(&self) -> usize {
        self.pending_edits.len()
    }

    /// Open a document from bytes and take a fresh field snapshot.
    /// Pending edits are cleared; the applied record survives only on a
    /// continuation.
    pub fn load_bytes(
        &mut self,
        engine: &dyn DocumentEngine,
        bytes: &[u8],
    ) -> Result<usize, SessionError> {
        let handle = engine.open(bytes)?;
        self.fields = extract_fields(handle.as_ref()).map_err(|e| match e {
            crate::error::ExtractError::Engine(inner) => SessionError::Engine(inner),
        })?;
        self.document = Some(handle);
        self.source_path = None;
        self.pending_edits.clear();
        if !self.continuation {
            self.applied_edits.clear();
        }
        info!("loaded document with {} form fields", self.fields.len());
        Ok(self.fields.len())
    }

    /// Open a document from a path. An unreadable path is an error; there
    /// is no fallback document.
    pub fn load_path(
        &mut self,
        engine: &dyn DocumentEngine,
        path: &Path,
    ) -> Result<usize, SessionError> {
        let bytes = std::fs::read(path)?;
        let count = self.load_bytes(engine, &bytes)?;
        self.source_path = Some(path.to_path_buf());
        Ok(count)
    }

    /// Stage a value for a field. Validates the id against the current
    /// snapshot, coerces checkbox values to booleans, and overwrites any
    /// prior pending value for the same id (last write wins).
    pub fn stage(&mut self, field_id: &str, value: FieldValue) -> Result<StagedEdit, SessionError> {
        if self.document.is_none() {
            return Err(SessionError::NoDocument);
        }
        let field = self
            .fields
            .iter()
            .find(|f| f.field_id == field_id)
            .ok_or_else(|| SessionError::FieldNotFound(field_id.to_string()))?;

        let value = match field.field_type {
            FieldType::Checkbox => FieldValue::Bool(coerce_checkbox_value(&value)),
            _ => value,
        };

        self.pending_edits.insert(field_id.to_string(), value.clone());
        debug!(
            "staged {} = {} ({} pending)",
            field_id,
            value,
            self.pending_edits.len()
        );
        Ok(StagedEdit {
            field_id: field_id.to_string(),
            value,
            pending_count: self.pending_edits.len(),
        })
    }

    /// Stage a batch of edits, reporting a per-edit outcome. Unknown ids
    /// are recorded as failures without affecting the rest of the batch.
    pub fn stage_batch(&mut self, edits: Vec<FieldEdit>) -> Vec<StageOutcome> {
        edits
            .into_iter()
            .map(|edit| match self.stage(&edit.field_id, edit.value) {
                Ok(staged) => StageOutcome {
                    field_id: staged.field_id,
                    staged: true,
                    value: Some(staged.value),
                    error: None,
                },
                Err(e) => StageOutcome {
                    field_id: edit.field_id,
                    staged: false,
                    value: None,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    /// Review every staged edit before a commit.
    pub fn pending_review(&self) -> Vec<PendingEdit> {
        self.pending_edits
            .iter()
            .map(|(field_id, value)| {
                let field = self.fields.iter().find(|f| &f.field_id == field_id);
                PendingEdit {
                    field_id: field_id.clone(),
                    value: value.clone(),
                    field_type: field.map(|f| f.field_type),
                    label: field
                        .and_then(|f| f.native_field_name.as_deref())
                        .and_then(label_for),
                    label_context: field
                        .map(|f| truncate_chars(&f.label_context, REVIEW_CONTEXT_LEN))
                        .unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Effective value of a field: a committed edit wins over the value
    /// read at extraction time.
    pub fn effective_value(&self, field: &DetectedField) -> Option<String> {
        self.applied_edits
            .get(&field.field_id)
            .map(|v| v.as_text())
            .or_else(|| field.current_value.clone())
    }

    /// Fields whose label context matches the query, whole or word-wise.
    pub fn search_fields(&self, query: &str) -> Vec<&DetectedField> {
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();
        self.fields
            .iter()
            .filter(|f| {
                let context = f.label_context.to_lowercase();
                context.contains(&query) || words.iter().any(|w| context.contains(w))
            })
            .collect()
    }

    pub fn field_details(&self, field_id: &str) -> Option<FieldDetails> {
        let field = self.fields.iter().find(|f| f.field_id == field_id)?;
        Some(FieldDetails {
            field_id: field.field_id.clone(),
            field_type: field.field_type,
            page: field.page,
            label_context: field.label_context.clone(),
            label: field.native_field_name.as_deref().and_then(label_for),
            options: field.options.clone(),
            pending_value: self.pending_edits.get(field_id).cloned(),
            current_value: self.effective_value(field),
        })
    }

    /// Human-readable summary of the loaded form, for logs and messages.
    pub fn summary(&self) -> String {
        if self.fields.is_empty() {
            return "No fillable form fields detected in this document.".to_string();
        }
        let mut lines = vec![format!("Found {} fillable form fields:", self.fields.len())];
        for field in &self.fields {
            lines.push(format!(
                "  - {} ({})",
                field.field_id, field.field_type
            ));
            lines.push(format!(
                "    Context: {}",
                truncate_chars(&field.label_context, REVIEW_CONTEXT_LEN)
            ));
            if let Some(value) = self.effective_value(field) {
                if !value.is_empty() {
                    lines.push(format!("    Current value: {}", value));
                }
            }
            if let Some(options) = &field.options {
                if !options.is_empty() {
                    lines.push(format!("    Options: {}", options.join(", ")));
                }
            }
        }
        lines.join("\n")
    }

    /// Seed the cumulative applied record from an externally persisted
    /// prior-turn result. This is how a continuation reconstructs "what
    /// was already filled" without re-reading the document for provenance.
    pub fn seed_applied(&mut self, edits: BTreeMap<String, FieldValue>) {
        for (field_id, value) in edits {
            self.applied_edits.insert(field_id, value);
        }
    }

    /// Back to the empty state: releases the document handle and forgets
    /// fields, staged edits and the applied record.
    pub fn hard_reset(&mut self) {
        self.document = None;
        self.fields.clear();
        self.pending_edits.clear();
        self.applied_edits.clear();
        self.source_path = None;
        self.output_path = None;
        self.saved_bytes = None;
        self.last_output = None;
        self.continuation = false;
        debug!("session hard reset");
    }

    /// New turn of an ongoing conversation: staged edits are dropped, the
    /// open document and the applied record survive.
    pub fn soft_reset(&mut self) {
        self.pending_edits.clear();
        debug!("session soft reset");
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

pub type SharedSession = Arc<Mutex<FormSession>>;

/// Lock a shared session. A poisoned lock is recovered, not propagated.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, FormSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of edit sessions keyed by conversation id. Two conversations
/// never share a session or a document handle.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session under a fresh conversation id.
    pub fn create(&self) -> (String, SharedSession) {
        let id = Uuid::new_v4().to_string();
        let session: SharedSession = Arc::new(Mutex::new(FormSession::new()));
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.clone(), Arc::clone(&session));
        info!("created session {}", id);
        (id, session)
    }

    pub fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }

    /// Dropping the returned handle after removal releases the document.
    pub fn remove(&self, id: &str) -> Option<SharedSession> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
