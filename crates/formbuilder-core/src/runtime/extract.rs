// crates/formbuilder-core/src/runtime/extract.rs
// ============================================================================
// Module: Response Extractor
// Description: Normalizes submitted key/value pairs against the response template.
// Purpose: Produce records with exactly the configured field keys.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Extraction reads every template key from the raw input. Absent keys map to
//! NULL rather than an error, and keys outside the template are dropped. When
//! a key repeats, the first occurrence wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::value::FieldValue;
use crate::core::value::SubmissionRecord;

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Builds a record holding exactly the keys in `template`.
#[must_use]
pub fn extract_response(raw: &[(String, String)], template: &[String]) -> SubmissionRecord {
    let submitted = first_values(raw);
    template
        .iter()
        .map(|key| {
            let value = submitted
                .get(key.as_str())
                .map_or(FieldValue::Null, |value| FieldValue::Text((*value).to_string()));
            (key.clone(), value)
        })
        .collect()
}

/// Returns the first submitted value for `key`.
#[must_use]
pub fn form_value<'a>(raw: &'a [(String, String)], key: &str) -> Option<&'a str> {
    raw.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
}

/// Indexes raw pairs by key, keeping the first value.
fn first_values(raw: &[(String, String)]) -> BTreeMap<&str, &str> {
    let mut values = BTreeMap::new();
    for (key, value) in raw {
        values.entry(key.as_str()).or_insert(value.as_str());
    }
    values
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn absent_keys_become_null_and_extras_are_dropped() {
        let template = vec!["field1".to_string(), "field2".to_string()];
        let record =
            extract_response(&pairs(&[("field1", "x"), ("csrf", "zzz")]), &template);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("field1"), Some(&FieldValue::Text("x".to_string())));
        assert_eq!(record.get("field2"), Some(&FieldValue::Null));
        assert!(!record.contains("csrf"));
    }

    #[test]
    fn first_duplicate_wins() {
        let template = vec!["a".to_string()];
        let record = extract_response(&pairs(&[("a", "1"), ("a", "2")]), &template);
        assert_eq!(record.get("a"), Some(&FieldValue::Text("1".to_string())));
        assert_eq!(form_value(&pairs(&[("a", "1"), ("a", "2")]), "a"), Some("1"));
    }
}
