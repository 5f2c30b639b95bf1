//! Fillable-field discovery with semantic label context.
//!
//! Only native form widgets are detected; a document without any yields an
//! empty list, which callers must treat as a valid outcome distinct from
//! extraction failure.

use tracing::debug;

use crate::engine::{DocumentEngine, DocumentHandle, Rect, WidgetKind};
use crate::error::ExtractError;
use crate::field::{field_id_for, DetectedField, FieldType};

/// Radius in page units searched around a widget for nearby label text.
pub const CONTEXT_RADIUS: f64 = 100.0;

/// Maximum number of nearby text lines kept per field.
pub const CONTEXT_LINES: usize = 5;

const CONTEXT_DELIMITER: &str = " | ";

/// Open `bytes` and extract its fields. The handle is released before
/// returning.
pub fn detect_form_fields(
    engine: &dyn DocumentEngine,
    bytes: &[u8],
) -> Result<Vec<DetectedField>, ExtractError> {
    let handle = engine.open(bytes)?;
    extract_fields(handle.as_ref())
}

/// Extract every named form widget from an open document, in page order
/// then widget order. Deterministic for a byte-identical input.
pub fn extract_fields(handle: &dyn DocumentHandle) -> Result<Vec<DetectedField>, ExtractError> {
    let mut fields = Vec::new();

    for page in 0..handle.page_count() {
        for widget in handle.widgets(page)? {
            if widget.native_name.is_empty() {
                continue;
            }

            let options = match widget.kind {
                WidgetKind::ComboBox | WidgetKind::ListBox => {
                    Some(widget.choice_values.clone().unwrap_or_default())
                }
                _ => None,
            };

            let label_context = nearby_text(handle, page, widget.rect)?;

            fields.push(DetectedField {
                field_id: field_id_for(page, &widget.native_name),
                field_type: classify(widget.kind),
                bbox: widget.rect,
                page,
                label_context,
                current_value: widget.value.clone(),
                options,
                native_field_name: Some(widget.native_name.clone()),
            });
        }
    }

    debug!(
        "extracted {} fields from {} pages",
        fields.len(),
        handle.page_count()
    );
    Ok(fields)
}

/// Widget kind to field type. Total: anything unrecognized is treated as a
/// text field rather than an error.
fn classify(kind: WidgetKind) -> FieldType {
    match kind {
        WidgetKind::Text => FieldType::Text,
        WidgetKind::Checkbox => FieldType::Checkbox,
        WidgetKind::ComboBox | WidgetKind::ListBox => FieldType::Dropdown,
        WidgetKind::Radio => FieldType::Radio,
        WidgetKind::PushButton | WidgetKind::Signature | WidgetKind::Unknown => FieldType::Text,
    }
}

/// Text within [`CONTEXT_RADIUS`] of the widget, clamped to the page,
/// first [`CONTEXT_LINES`] non-blank lines pipe-joined.
fn nearby_text(
    handle: &dyn DocumentHandle,
    page: usize,
    rect: Rect,
) -> Result<String, ExtractError> {
    let bounds = handle.page_bounds(page)?;
    let clip = rect.expand(CONTEXT_RADIUS).intersect(&bounds);
    let text = handle.read_text(page, clip)?;

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(CONTEXT_LINES)
        .collect();
    Ok(lines.join(CONTEXT_DELIMITER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeEngine, FakePage, FakeText};
    use crate::engine::Widget;
    use pretty_assertions::assert_eq;

    fn widget(name: &str, kind: WidgetKind, rect: Rect) -> Widget {
        Widget {
            native_name: name.to_string(),
            kind,
            rect,
            value: None,
            choice_values: None,
        }
    }

    #[test]
    fn test_empty_document_yields_empty_list() {
        let engine = FakeEngine::empty(1);
        let fields = detect_form_fields(&engine, b"%fake").unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let mut page = FakePage::letter();
        page.widgets.push(widget("Name", WidgetKind::Text, Rect::new(72.0, 700.0, 272.0, 716.0)));
        page.widgets.push(widget("Agree", WidgetKind::Checkbox, Rect::new(72.0, 650.0, 88.0, 666.0)));
        let engine = FakeEngine::with_pages(vec![page]);

        let first = detect_form_fields(&engine, b"%fake").unwrap();
        let second = detect_form_fields(&engine, b"%fake").unwrap();
        let ids: Vec<_> = first.iter().map(|f| f.field_id.clone()).collect();
        assert_eq!(ids, vec!["page0_Name", "page0_Agree"]);
        assert_eq!(
            ids,
            second.iter().map(|f| f.field_id.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_nameless_widgets_are_skipped() {
        let mut page = FakePage::letter();
        page.widgets.push(widget("", WidgetKind::Text, Rect::new(0.0, 0.0, 10.0, 10.0)));
        page.widgets.push(widget("Kept", WidgetKind::Text, Rect::new(0.0, 0.0, 10.0, 10.0)));
        let engine = FakeEngine::with_pages(vec![page]);

        let fields = detect_form_fields(&engine, b"%fake").unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_id, "page0_Kept");
    }

    #[test]
    fn test_unknown_kinds_default_to_text() {
        let mut page = FakePage::letter();
        page.widgets.push(widget("Sig", WidgetKind::Signature, Rect::new(0.0, 0.0, 10.0, 10.0)));
        page.widgets.push(widget("Odd", WidgetKind::Unknown, Rect::new(0.0, 0.0, 10.0, 10.0)));
        let engine = FakeEngine::with_pages(vec![page]);

        let fields = detect_form_fields(&engine, b"%fake").unwrap();
        assert!(fields.iter().all(|f| f.field_type == FieldType::Text));
    }

    #[test]
    fn test_choice_widget_options_empty_vs_absent() {
        let mut page = FakePage::letter();
        let mut dropdown = widget("State", WidgetKind::ComboBox, Rect::new(0.0, 0.0, 10.0, 10.0));
        dropdown.choice_values = Some(vec!["FL".to_string(), "GA".to_string()]);
        let bare_dropdown = widget("Empty", WidgetKind::ComboBox, Rect::new(0.0, 20.0, 10.0, 30.0));
        let text = widget("Name", WidgetKind::Text, Rect::new(0.0, 40.0, 10.0, 50.0));
        page.widgets.extend([dropdown, bare_dropdown, text]);
        let engine = FakeEngine::with_pages(vec![page]);

        let fields = detect_form_fields(&engine, b"%fake").unwrap();
        assert_eq!(fields[0].options, Some(vec!["FL".to_string(), "GA".to_string()]));
        assert_eq!(fields[1].options, Some(vec![]));
        assert_eq!(fields[2].options, None);
    }

    #[test]
    fn test_label_context_caps_at_five_lines() {
        let mut page = FakePage::letter();
        page.widgets.push(widget("Name", WidgetKind::Text, Rect::new(100.0, 400.0, 200.0, 416.0)));
        for i in 0..8 {
            page.texts.push(FakeText::new(
                100.0,
                420.0 + (i as f64) * 10.0,
                format!("line{}", i),
            ));
        }
        let engine = FakeEngine::with_pages(vec![page]);

        let fields = detect_form_fields(&engine, b"%fake").unwrap();
        let parts: Vec<_> = fields[0].label_context.split(" | ").collect();
        assert_eq!(parts.len(), 5);
    }

    #[test]
    fn test_label_context_excludes_distant_text() {
        let mut page = FakePage::letter();
        page.widgets.push(widget("Name", WidgetKind::Text, Rect::new(100.0, 400.0, 200.0, 416.0)));
        page.texts.push(FakeText::new(110.0, 430.0, "Full legal name".to_string()));
        page.texts.push(FakeText::new(110.0, 700.0, "Unrelated header".to_string()));
        let engine = FakeEngine::with_pages(vec![page]);

        let fields = detect_form_fields(&engine, b"%fake").unwrap();
        assert_eq!(fields[0].label_context, "Full legal name");
    }
}
