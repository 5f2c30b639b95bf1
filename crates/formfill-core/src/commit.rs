//! Commit engine: apply staged edits to the live document and persist.
//!
//! Commits are best-effort batches. Field-level failures are accumulated
//! and returned next to whatever succeeded; only a persistence failure is
//! fatal to the call as a whole.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::engine::WidgetValue;
use crate::error::SessionError;
use crate::field::{coerce_checkbox_value, field_id_for, FieldType, FieldValue};
use crate::session::FormSession;

#[derive(Debug, Clone, Serialize)]
pub struct AppliedEdit {
    pub field_id: String,
    pub value: FieldValue,
}

/// Outcome of a commit. `success` is false whenever `errors` is nonempty,
/// but `applied` still lists everything that went through: callers must
/// not read a failed commit as "nothing happened".
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub success: bool,
    pub applied: Vec<AppliedEdit>,
    pub applied_count: usize,
    /// Cumulative count across all turns of the conversation.
    pub total_fields_filled: usize,
    pub errors: Vec<String>,
    pub output_location: PathBuf,
}

const DEFAULT_OUTPUT_SUFFIX: &str = "_filled";

/// Destination used when the caller configured none: the source path with
/// `_filled` spliced in before the extension.
pub fn default_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => source.with_file_name(format!("{}{}.{}", stem, DEFAULT_OUTPUT_SUFFIX, ext)),
        None => source.with_file_name(format!("{}{}", stem, DEFAULT_OUTPUT_SUFFIX)),
    }
}

impl FormSession {
    /// Apply every pending edit against the live document and persist to
    /// `destination` (falling back to the configured output path, then to
    /// a derived default).
    ///
    /// Widgets are located by recomputing the field id from page and
    /// native name on every commit, not via cached handles, because the
    /// document may have been externally re-saved between turns. The
    /// pending set is cleared unconditionally once the apply loop has
    /// run; a failed edit must be re-staged to retry it.
    pub fn commit(&mut self, destination: Option<&Path>) -> Result<CommitOutcome, SessionError> {
        let destination = match destination
            .map(Path::to_path_buf)
            .or_else(|| self.output_path.clone())
        {
            Some(path) => path,
            None => match &self.source_path {
                Some(source) => default_output_path(source),
                None => return Err(SessionError::NoDestination),
            },
        };

        let document = match self.document.as_mut() {
            Some(document) => document,
            None => return Err(SessionError::NoDocument),
        };

        let pending = std::mem::take(&mut self.pending_edits);
        let mut applied: Vec<AppliedEdit> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        for (field_id, value) in &pending {
            let field = match self.fields.iter().find(|f| &f.field_id == field_id) {
                Some(field) => field,
                None => {
                    errors.push(format!("Field not found: {}", field_id));
                    continue;
                }
            };

            let widgets = match document.widgets(field.page) {
                Ok(widgets) => widgets,
                Err(e) => {
                    errors.push(format!("Failed to apply {}: {}", field_id, e));
                    continue;
                }
            };
            let widget = match widgets
                .iter()
                .find(|w| field_id_for(field.page, &w.native_name) == *field_id)
            {
                Some(widget) => widget,
                None => {
                    errors.push(format!(
                        "Failed to apply {}: no matching widget on page {}",
                        field_id, field.page
                    ));
                    continue;
                }
            };

            let widget_value = match field.field_type {
                FieldType::Checkbox => WidgetValue::Toggle(coerce_checkbox_value(value)),
                _ => WidgetValue::Text(value.as_text()),
            };

            match document.set_widget_value(field.page, &widget.native_name, &widget_value) {
                Ok(()) => applied.push(AppliedEdit {
                    field_id: field_id.clone(),
                    value: value.clone(),
                }),
                Err(e) => errors.push(format!("Failed to apply {}: {}", field_id, e)),
            }
        }

        match document.save(&destination) {
            Ok(bytes) => {
                for edit in &applied {
                    self.applied_edits
                        .insert(edit.field_id.clone(), edit.value.clone());
                }
                self.saved_bytes = Some(bytes);
                self.last_output = Some(destination.clone());
                info!(
                    "committed {} of {} edits to {}",
                    applied.len(),
                    pending.len(),
                    destination.display()
                );
            }
            Err(e) => {
                // Nothing was persisted; the applied record stays untouched.
                warn!("commit save failed: {}", e);
                errors.push(format!("Save failed: {}", e));
            }
        }

        Ok(CommitOutcome {
            success: errors.is_empty(),
            applied_count: applied.len(),
            total_fields_filled: self.applied_edits.len(),
            applied,
            errors,
            output_location: destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Rect, Widget, WidgetKind};
    use crate::extract::detect_form_fields;
    use crate::testutil::{FakeEngine, FakePage};
    use pretty_assertions::assert_eq;

    fn engine() -> FakeEngine {
        let mut page = FakePage::letter();
        page.widgets.push(Widget {
            native_name: "Name".to_string(),
            kind: WidgetKind::Text,
            rect: Rect::new(72.0, 700.0, 272.0, 716.0),
            value: None,
            choice_values: None,
        });
        page.widgets.push(Widget {
            native_name: "Agree".to_string(),
            kind: WidgetKind::Checkbox,
            rect: Rect::new(72.0, 650.0, 88.0, 666.0),
            value: Some("false".to_string()),
            choice_values: None,
        });
        page.widgets.push(Widget {
            native_name: "State".to_string(),
            kind: WidgetKind::ComboBox,
            rect: Rect::new(72.0, 600.0, 172.0, 616.0),
            value: None,
            choice_values: Some(vec!["FL".to_string(), "GA".to_string()]),
        });
        FakeEngine::with_pages(vec![page])
    }

    fn loaded(engine: &FakeEngine) -> FormSession {
        let mut session = FormSession::new();
        session.load_bytes(engine, b"%fake").unwrap();
        session.set_output_path(Some(PathBuf::from("/tmp/out.pdf")));
        session
    }

    #[test]
    fn test_commit_applies_and_records() {
        let engine = engine();
        let mut session = loaded(&engine);
        session
            .stage("page0_Name", FieldValue::Text("John Doe".into()))
            .unwrap();

        let outcome = session.commit(None).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.applied_count, 1);
        assert_eq!(outcome.total_fields_filled, 1);
        assert_eq!(outcome.output_location, PathBuf::from("/tmp/out.pdf"));
        assert_eq!(
            session.applied_edits().get("page0_Name"),
            Some(&FieldValue::Text("John Doe".into()))
        );
        assert_eq!(session.pending_count(), 0);

        // Re-opening the saved output reports the committed value.
        let fields = detect_form_fields(&engine, b"%fake").unwrap();
        let name = fields.iter().find(|f| f.field_id == "page0_Name").unwrap();
        assert_eq!(name.current_value.as_deref(), Some("John Doe"));
    }

    #[test]
    fn test_commit_writes_checkbox_as_boolean() {
        let engine = engine();
        let mut session = loaded(&engine);
        session
            .stage("page0_Agree", FieldValue::Text("Yes".into()))
            .unwrap();

        let outcome = session.commit(None).unwrap();
        assert!(outcome.success);

        let fields = detect_form_fields(&engine, b"%fake").unwrap();
        let agree = fields.iter().find(|f| f.field_id == "page0_Agree").unwrap();
        assert_eq!(agree.current_value.as_deref(), Some("true"));
    }

    #[test]
    fn test_commit_partial_failure_reports_both_sides() {
        let engine = engine();
        let mut session = loaded(&engine);
        session
            .stage("page0_Name", FieldValue::Text("John".into()))
            .unwrap();
        session
            .stage("page0_State", FieldValue::Text("FL".into()))
            .unwrap();
        // Force an unknown id into the pending set by shrinking the
        // snapshot after staging, simulating a stale reference.
        session
            .pending_edits
            .insert("page0_Ghost".to_string(), FieldValue::Text("x".into()));

        let outcome = session.commit(None).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.applied_count, 2);
        assert!(outcome.errors[0].contains("page0_Ghost"));
        // Failed ids are dropped too; retry requires re-staging.
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_commit_write_failure_continues_batch() {
        let engine = engine().with_failing_write("Name");
        let mut session = loaded(&engine);
        session
            .stage("page0_Name", FieldValue::Text("John".into()))
            .unwrap();
        session
            .stage("page0_State", FieldValue::Text("FL".into()))
            .unwrap();

        let outcome = session.commit(None).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.applied_count, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("page0_Name"));
        assert_eq!(session.applied_edits().len(), 1);
    }

    #[test]
    fn test_commit_save_failure_is_fatal_but_reported() {
        let engine = engine().with_failing_save();
        let mut session = loaded(&engine);
        session
            .stage("page0_Name", FieldValue::Text("John".into()))
            .unwrap();

        let outcome = session.commit(None).unwrap();
        assert!(!outcome.success);
        assert!(outcome.errors.iter().any(|e| e.starts_with("Save failed")));
        // Nothing persisted: the applied record is untouched, pending is
        // still cleared.
        assert!(session.applied_edits().is_empty());
        assert_eq!(session.pending_count(), 0);
        assert!(session.saved_bytes().is_none());
    }

    #[test]
    fn test_commit_explicit_destination_wins() {
        let engine = engine();
        let mut session = loaded(&engine);
        session
            .stage("page0_Name", FieldValue::Text("John".into()))
            .unwrap();

        let outcome = session.commit(Some(Path::new("/tmp/other.pdf"))).unwrap();
        assert_eq!(outcome.output_location, PathBuf::from("/tmp/other.pdf"));
        assert_eq!(engine.saved_paths(), vec![PathBuf::from("/tmp/other.pdf")]);
    }

    #[test]
    fn test_commit_without_destination_fails_cleanly() {
        let engine = engine();
        let mut session = FormSession::new();
        session.load_bytes(&engine, b"%fake").unwrap();

        let err = session.commit(None).unwrap_err();
        assert!(matches!(err, SessionError::NoDestination));
    }

    #[test]
    fn test_default_output_path_suffixes_before_extension() {
        assert_eq!(
            default_output_path(Path::new("/forms/w9.pdf")),
            PathBuf::from("/forms/w9_filled.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("upload")),
            PathBuf::from("upload_filled")
        );
    }

    #[test]
    fn test_empty_commit_still_saves() {
        let engine = engine();
        let mut session = loaded(&engine);

        let outcome = session.commit(None).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.applied_count, 0);
        assert!(session.saved_bytes().is_some());
    }
}
