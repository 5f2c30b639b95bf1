//! Human-readable labels derived from raw native field names.
//!
//! Documents routinely qualify field names through a form hierarchy
//! (`topmostSubform[0].Page1[0].LastName[0]`) or tag them with widget-type
//! prefixes (`chkAgree`, `txtPhone`). This module turns those into display
//! labels. The output is a presentation aid only and must never be used as
//! a lookup key.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref INDEX_SUFFIX: Regex = Regex::new(r"\[\d+\]").unwrap();
}

/// Widget-type prefixes stripped when immediately followed by an uppercase
/// letter, digit or underscore. Checked in order; only one is stripped.
const STRIP_PREFIXES: [&str; 9] = [
    "txt", "fld", "field", "text", "chk", "checkbox", "radio", "rb", "cb",
];

const MAX_LABEL_LEN: usize = 30;

/// Derive a display label from a native field name. Returns `None` when the
/// name is empty or consists only of structural noise.
pub fn label_for(native_name: &str) -> Option<String> {
    // Only the leaf of a qualified name carries meaning.
    let leaf = match native_name.rsplit_once('.') {
        Some((_, leaf)) => leaf,
        None => native_name,
    };

    let name = INDEX_SUFFIX.replace_all(leaf, "");
    let name = strip_type_prefix(&name);

    let words = split_words(name);
    if words.is_empty() {
        return None;
    }

    let label = words
        .iter()
        .map(|w| title_case(w))
        .collect::<Vec<_>>()
        .join(" ");

    Some(truncate_on_word(&label))
}

fn strip_type_prefix(name: &str) -> &str {
    for prefix in STRIP_PREFIXES {
        if name.len() > prefix.len()
            && name.is_char_boundary(prefix.len())
            && name[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            let rest = &name[prefix.len()..];
            if rest
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
            {
                return rest;
            }
        }
    }
    name
}

/// Split on underscores, spaces, and lowercase-to-uppercase camel
/// boundaries.
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if c == '_' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Cap at [`MAX_LABEL_LEN`] characters, dropping a trailing partial word.
fn truncate_on_word(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_LEN {
        return label.to_string();
    }
    let prefix: String = label.chars().take(MAX_LABEL_LEN).collect();
    match prefix.rsplit_once(' ') {
        Some((head, _)) => head.to_string(),
        None => prefix,
    }
}
