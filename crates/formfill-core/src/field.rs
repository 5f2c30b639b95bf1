//! Field data model: detected fields, staged edits, id computation.

use serde::{Deserialize, Serialize};

use crate::engine::Rect;

/// Form field types recognized by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Checkbox,
    Dropdown,
    Radio,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Checkbox => write!(f, "checkbox"),
            FieldType::Dropdown => write!(f, "dropdown"),
            FieldType::Radio => write!(f, "radio"),
        }
    }
}

/// A fillable form field detected in a loaded document.
///
/// Identity is `field_id`, a stable composite of page index and native
/// field name; re-extracting an unmodified document reproduces the same
/// ids in the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedField {
    pub field_id: String,
    pub field_type: FieldType,
    pub bbox: Rect,
    pub page: usize,
    /// Nearby text, pipe-joined, for semantic understanding of the field.
    pub label_context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<String>,
    /// Present only for dropdown/radio-like widgets. An empty list means a
    /// choice widget with no configured options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Raw native field name, used only for label derivation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_field_name: Option<String>,
}

/// A staged or applied field value. Checkbox edits carry booleans, every
/// other field type carries strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// String rendering used when writing into non-checkbox widgets;
    /// booleans lowercase.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// The unit of staging and commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEdit {
    pub field_id: String,
    pub value: FieldValue,
}

/// Compute the stable field id for a widget: `page<N>_<nativeName>`.
///
/// Extraction and commit both go through here; it is the single source of
/// truth for id computation.
pub fn field_id_for(page: usize, native_name: &str) -> String {
    format!("page{}_{}", page, native_name)
}

/// Tokens interpreted as `true` when coercing a string onto a checkbox.
const TRUTHY_TOKENS: [&str; 4] = ["true", "yes", "1", "checked"];

/// Coerce an arbitrary staged value into a checkbox boolean. Anything
/// outside the truthy-token set, including the empty string, is `false`.
pub fn coerce_checkbox_value(value: &FieldValue) -> bool {
    match value {
        FieldValue::Bool(b) => *b,
        FieldValue::Text(s) => TRUTHY_TOKENS.contains(&s.to_ascii_lowercase().as_str()),
    }
}
