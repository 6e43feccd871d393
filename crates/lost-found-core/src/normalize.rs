//! Label and query normalization.
//!
//! Classifier vocabularies are commonly stored as `"<index> <name>"`, and
//! detectors return mixed-case text. Everything that is stored or searched
//! goes through [`normalize_label`] first so both sides compare equal.

use std::collections::HashSet;

use crate::models::LabelPrediction;

/// Canonicalize a raw classifier label.
///
/// 1. Lowercase.
/// 2. Collapse whitespace runs to one space and trim.
/// 3. Strip leading `<digits><space>` prefixes.
///
/// Prefix stripping repeats until none is left, which keeps the function
/// idempotent for inputs like `"3 7 wallet"`.
///
/// ```rust
/// use lost_found_core::normalize::normalize_label;
///
/// assert_eq!(normalize_label("3 Wallet"), "wallet");
/// assert_eq!(normalize_label("  Sun   Glasses "), "sun glasses");
/// assert_eq!(normalize_label("42"), "42");
/// ```
pub fn normalize_label(raw: &str) -> String {
    let collapsed = raw
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut rest = collapsed.as_str();
    while let Some(stripped) = strip_index_prefix(rest) {
        rest = stripped;
    }
    rest.to_string()
}

/// Returns the remainder after a leading `<ascii digits><space>`, if present.
fn strip_index_prefix(s: &str) -> Option<&str> {
    let digits = s.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let after = s[digits..].strip_prefix(' ')?;
    if after.is_empty() {
        None
    } else {
        Some(after)
    }
}

/// Normalize free-text user input (search queries, item names, categories).
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalize a sequence of raw labels into an ordered, duplicate-free set.
///
/// Empty results are dropped. Comparison happens after normalization, so
/// `"Bag"` and `"2 bag"` collapse into one entry.
pub fn normalize_labels<'a, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for label in raw {
        let norm = normalize_label(label);
        if norm.is_empty() {
            continue;
        }
        if seen.insert(norm.clone()) {
            out.push(norm);
        }
    }
    out
}

/// Normalize classifier output, keeping its confidence order.
pub fn normalize_predictions(predictions: &[LabelPrediction]) -> Vec<String> {
    normalize_labels(predictions.iter().map(|p| p.text.as_str()))
}

/// Append `extra` labels to `base`, normalizing and de-duplicating.
pub fn merge_labels(base: &[String], extra: &[String]) -> Vec<String> {
    normalize_labels(base.iter().chain(extra.iter()).map(String::as_str))
}
