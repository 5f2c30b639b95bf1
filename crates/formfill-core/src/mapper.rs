//! Instruction-to-edit mapping contract, plus the keyword fallback.
//!
//! The real mapping step is an external language-model call; the engine
//! only depends on this trait. An empty result means the mapper ran and
//! found nothing actionable, which callers surface differently from
//! [`crate::MapperError::Unavailable`].

use std::collections::HashSet;

use crate::error::MapperError;
use crate::field::{DetectedField, FieldEdit, FieldType, FieldValue};
use crate::label::label_for;

pub trait InstructionMapper: Send + Sync {
    fn map(
        &self,
        instructions: &str,
        fields: &[DetectedField],
    ) -> Result<Vec<FieldEdit>, MapperError>;
}

/// Credential-free mapper parsing `key: value` pairs out of the
/// instructions and matching keys against each field's label context.
/// Useful without an API key and as a deterministic baseline in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordMapper;

impl KeywordMapper {
    pub fn new() -> Self {
        Self
    }

    fn match_field<'a>(
        key: &str,
        fields: &'a [DetectedField],
        claimed: &HashSet<&str>,
    ) -> Option<&'a DetectedField> {
        let words: Vec<&str> = key.split_whitespace().collect();
        fields.iter().find(|field| {
            if claimed.contains(field.field_id.as_str()) {
                return false;
            }
            let mut haystack = field.label_context.to_lowercase();
            if let Some(label) = field.native_field_name.as_deref().and_then(label_for) {
                haystack.push(' ');
                haystack.push_str(&label.to_lowercase());
            }
            haystack.contains(key) || words.iter().all(|w| haystack.contains(w))
        })
    }
}

impl InstructionMapper for KeywordMapper {
    fn map(
        &self,
        instructions: &str,
        fields: &[DetectedField],
    ) -> Result<Vec<FieldEdit>, MapperError> {
        let mut edits = Vec::new();
        let mut claimed: HashSet<&str> = HashSet::new();

        for pair in instructions.split(|c| c == ',' || c == '\n' || c == ';') {
            let Some((key, value)) = pair.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                continue;
            }

            let Some(field) = Self::match_field(&key, fields, &claimed) else {
                continue;
            };

            let value = match field.field_type {
                FieldType::Checkbox => {
                    FieldValue::Bool(crate::field::coerce_checkbox_value(&FieldValue::Text(
                        value.to_string(),
                    )))
                }
                _ => FieldValue::Text(value.to_string()),
            };
            claimed.insert(field.field_id.as_str());
            edits.push(FieldEdit {
                field_id: field.field_id.clone(),
                value,
            });
        }

        Ok(edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Rect;
    use pretty_assertions::assert_eq;

    fn field(id: &str, field_type: FieldType, context: &str) -> DetectedField {
        DetectedField {
            field_id: id.to_string(),
            field_type,
            bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
            page: 0,
            label_context: context.to_string(),
            current_value: None,
            options: None,
            native_field_name: None,
        }
    }

    #[test]
    fn test_keyword_mapper_matches_by_context() {
        let fields = vec![
            field("page0_Name", FieldType::Text, "Full name of applicant"),
            field("page0_Email", FieldType::Text, "Email address"),
        ];
        let edits = KeywordMapper::new()
            .map("name: John Doe, email: john@example.com", &fields)
            .unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].field_id, "page0_Name");
        assert_eq!(edits[0].value, FieldValue::Text("John Doe".into()));
        assert_eq!(edits[1].field_id, "page0_Email");
    }

    #[test]
    fn test_keyword_mapper_coerces_checkbox_targets() {
        let fields = vec![field(
            "page0_Agree",
            FieldType::Checkbox,
            "I agree to the terms",
        )];
        let edits = KeywordMapper::new().map("agree: yes", &fields).unwrap();
        assert_eq!(edits[0].value, FieldValue::Bool(true));
    }

    #[test]
    fn test_keyword_mapper_claims_each_field_once() {
        let fields = vec![field("page0_Name", FieldType::Text, "Name")];
        let edits = KeywordMapper::new()
            .map("name: John, name: Jane", &fields)
            .unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].value, FieldValue::Text("John".into()));
    }

    #[test]
    fn test_keyword_mapper_empty_result_is_ok() {
        let fields = vec![field("page0_Name", FieldType::Text, "Name")];
        let edits = KeywordMapper::new()
            .map("completely unrelated prose", &fields)
            .unwrap();
        assert!(edits.is_empty());
    }
}
