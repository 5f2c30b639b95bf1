//! Property-based tests for the FormFill API invariants.
//!
//! Exercises the core contracts the API relies on: field id stability,
//! label derivation bounds, and checkbox value coercion.

use proptest::prelude::*;

use formfill_core::{coerce_checkbox_value, field_id_for, label_for, FieldValue};

// ============================================================
// Field id computation
// ============================================================

fn native_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_.\\[\\]]{0,40}"
}

/// Realistic AcroForm names: word characters with optional `[N]` indices.
fn acroform_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,20}(\\[[0-9]\\])?"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn field_ids_are_deterministic(page in 0usize..50, name in native_name()) {
        let first = field_id_for(page, &name);
        let second = field_id_for(page, &name);
        prop_assert_eq!(&first, &second);
        let expected_prefix = format!("page{}_", page);
        prop_assert!(first.starts_with(&expected_prefix));
    }

    #[test]
    fn field_ids_differ_across_pages(page in 0usize..49, name in native_name()) {
        prop_assert_ne!(field_id_for(page, &name), field_id_for(page + 1, &name));
    }

    #[test]
    fn field_ids_match_expected_pattern(page in 0usize..50, name in native_name()) {
        let id_pattern = regex::Regex::new(r"^page\d+_.+$").unwrap();
        prop_assert!(id_pattern.is_match(&field_id_for(page, &name)));
    }

    // ============================================================
    // Label derivation
    // ============================================================

    #[test]
    fn labels_are_bounded_and_clean(name in acroform_name()) {
        if let Some(label) = label_for(&name) {
            prop_assert!(label.chars().count() <= 30);
            prop_assert!(!label.contains('['));
            prop_assert!(!label.contains(']'));
            prop_assert!(!label.contains('_'));
            prop_assert!(!label.starts_with(' '));
            prop_assert!(!label.ends_with(' '));
        }
    }

    #[test]
    fn labels_ignore_path_qualification(leaf in "[A-Za-z]{2,20}") {
        let qualified = format!("topmostSubform[0].Page1[0].{}[0]", leaf);
        prop_assert_eq!(label_for(&qualified), label_for(&leaf));
    }

    // ============================================================
    // Checkbox coercion
    // ============================================================

    #[test]
    fn truthy_tokens_coerce_true_in_any_case(token in prop_oneof![
        Just("true"), Just("yes"), Just("1"), Just("checked"),
    ], upper in any::<bool>()) {
        let token = if upper { token.to_uppercase() } else { token.to_string() };
        prop_assert!(coerce_checkbox_value(&FieldValue::Text(token)));
    }

    #[test]
    fn other_strings_coerce_false(value in "[a-z]{2,12}") {
        prop_assume!(!matches!(value.as_str(), "true" | "yes" | "checked"));
        prop_assert!(!coerce_checkbox_value(&FieldValue::Text(value)));
    }

    #[test]
    fn booleans_pass_through(value in any::<bool>()) {
        prop_assert_eq!(coerce_checkbox_value(&FieldValue::Bool(value)), value);
    }
}
