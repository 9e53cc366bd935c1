//! Parse model output into a typed partial result
//!
//! Models wrap JSON in prose and markdown fences, rename keys, and
//! occasionally nest the answer one level deep. The parser scans for the
//! first balanced `{...}` span that is a valid JSON object and matches keys
//! loosely against field names and labels. It never fails: output without
//! a JSON object becomes a result with every field "not found".

use crate::coerce::coerce;
use crate::types::{ParsedField, PartialResult};
use omx_domain::FieldGroup;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Parse one task's model response for `group`
pub fn parse_model_response(
    response: &str,
    group: &FieldGroup,
    chunk_index: usize,
) -> PartialResult {
    let Some(object) = find_json_object(response) else {
        warn!(
            group = group.id(),
            chunk = chunk_index,
            response_chars = response.len(),
            "No JSON object in model response"
        );
        return PartialResult::failed(group, chunk_index);
    };

    let object = unwrap_envelope(object, group);
    let by_key: HashMap<String, &Value> = object
        .iter()
        .map(|(key, value)| (normalize_key(key), value))
        .collect();

    let fields = group
        .fields()
        .iter()
        .map(|spec| {
            let value = by_key
                .get(&normalize_key(spec.name))
                .or_else(|| by_key.get(&normalize_key(spec.label)))
                .copied();

            let parsed = match value {
                Some(value) => coerce(spec.field_type, value),
                None => ParsedField::missing(),
            };
            if parsed.coercion_failed {
                warn!(
                    group = group.id(),
                    chunk = chunk_index,
                    field = spec.name,
                    raw = parsed.raw.as_deref().unwrap_or(""),
                    "Field value failed {} coercion",
                    spec.field_type
                );
            }
            (spec.name, parsed)
        })
        .collect();

    let result = PartialResult {
        group_id: group.id(),
        chunk_index,
        json_found: true,
        fields,
    };
    debug!(
        group = group.id(),
        chunk = chunk_index,
        found = result.found_count(),
        "Parsed model response"
    );
    result
}

/// Find the first balanced `{...}` span that parses as a JSON object
pub fn find_json_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let end = balanced_end(&text[start..])?;
        match serde_json::from_str::<Value>(&text[start..start + end]) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}

/// Byte length of the balanced object starting at `text[0] == '{'`
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Descend into `{"data": {...}}` style wrappers when no key matches directly
fn unwrap_envelope(object: Map<String, Value>, group: &FieldGroup) -> Map<String, Value> {
    let matches_group = |map: &Map<String, Value>| {
        map.keys().any(|key| {
            let key = normalize_key(key);
            group
                .fields()
                .iter()
                .any(|f| normalize_key(f.name) == key || normalize_key(f.label) == key)
        })
    };

    if object.len() == 1 && !matches_group(&object) {
        if let Some(Value::Object(inner)) = object.values().next() {
            if matches_group(inner) {
                return inner.clone();
            }
        }
    }
    object
}

/// Lowercase snake_case form of a key ("Sales Price", "salesPrice" and
/// "sales-price" all become "sales_price")
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;

    for c in key.trim().chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;
    use omx_domain::SchemaRegistry;

    fn financial() -> &'static FieldGroup {
        SchemaRegistry::group(2).unwrap()
    }

    #[test]
    fn test_plain_json() {
        let response = r#"{"sales_price": 1833000.00, "annual_rent": "$110,000", "lease_type": "NNN",
            "increases": null, "numerical_rent_increase": 3.0, "frequency_of_rent_increase": 1}"#;
        let result = parse_model_response(response, financial(), 0);

        assert!(result.json_found);
        assert_eq!(result.fields.len(), 6);
        assert_eq!(result.get("sales_price").unwrap().value, FieldValue::Decimal(1_833_000.0));
        assert_eq!(result.get("annual_rent").unwrap().value, FieldValue::Decimal(110_000.0));
        assert_eq!(result.get("increases").unwrap().value, FieldValue::NotFound);
        assert_eq!(result.found_count(), 5);
    }

    #[test]
    fn test_markdown_fenced_json() {
        let response = "Here is the data:\n```json\n{\"lease_type\": \"Gross\"}\n```\nLet me know!";
        let result = parse_model_response(response, financial(), 1);
        assert_eq!(result.get("lease_type").unwrap().value, FieldValue::Text("Gross".into()));
        assert_eq!(result.chunk_index, 1);
    }

    #[test]
    fn test_no_json_marks_all_not_found() {
        let result = parse_model_response("I could not find anything.", financial(), 0);
        assert!(!result.json_found);
        assert_eq!(result.fields.len(), 6);
        assert!(result.fields.values().all(|f| f.value == FieldValue::NotFound));
    }

    #[test]
    fn test_truncated_json_is_not_found() {
        let result = parse_model_response(r#"{"sales_price": 100, "annual_rent""#, financial(), 0);
        assert!(!result.json_found);
    }

    #[test]
    fn test_absent_fields_are_not_found() {
        let result = parse_model_response(r#"{"lease_type": "NNN"}"#, financial(), 0);
        let parsed = result.get("sales_price").unwrap();
        assert_eq!(parsed.value, FieldValue::NotFound);
        assert!(!parsed.coercion_failed);
    }

    #[test]
    fn test_tolerant_keys() {
        let response = r#"{"Sales Price": "1,000,000", "annualRent": 50000, "Lease-Type": "NNN"}"#;
        let result = parse_model_response(response, financial(), 0);
        assert_eq!(result.found_count(), 3);
    }

    #[test]
    fn test_envelope_unwrapped() {
        let response = r#"{"result": {"lease_type": "NNN", "annual_rent": 1}}"#;
        let result = parse_model_response(response, financial(), 0);
        assert_eq!(result.found_count(), 2);
    }

    #[test]
    fn test_skips_non_json_braces() {
        let response = r#"Fields {sales_price} requested. {"sales_price": "2M"}"#;
        let result = parse_model_response(response, financial(), 0);
        assert_eq!(result.get("sales_price").unwrap().value, FieldValue::Decimal(2_000_000.0));
    }

    #[test]
    fn test_braces_inside_strings() {
        let response = r#"{"increases": "3% {annually}", "lease_type": "NNN \"absolute\""}"#;
        let object = find_json_object(response).unwrap();
        assert_eq!(object.len(), 2);
    }

    #[test]
    fn test_flagged_field() {
        let result = parse_model_response(r#"{"sales_price": "upon request"}"#, financial(), 0);
        let parsed = result.get("sales_price").unwrap();
        assert!(parsed.coercion_failed);
        assert_eq!(parsed.raw.as_deref(), Some("upon request"));
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert!(find_json_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Sales Price"), "sales_price");
        assert_eq!(normalize_key("salesPrice"), "sales_price");
        assert_eq!(normalize_key("sales_price"), "sales_price");
        assert_eq!(normalize_key("Land (Acres)"), "land_acres");
        assert_eq!(normalize_key("Year Built/Renovated"), "year_built_renovated");
        assert_eq!(normalize_key("Building SF"), "building_sf");
        assert_eq!(normalize_key("Guarantor (Operator)"), "guarantor_operator");
    }
}
