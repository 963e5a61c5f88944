//! Helpers for reading untyped change fields

use crate::error::{Error, Result};
use crate::plan::Fields;
use serde_json::Value;

/// Prefix of serialized reference placeholders (`__REF__:<ref>#<field>`).
pub const REF_PLACEHOLDER_PREFIX: &str = "__REF__:";

/// Check that every required field is present and not an empty string.
pub fn validate_required_fields(fields: &Fields, resource_type: &str, required: &[&str]) -> Result<()> {
    for &field in required {
        match fields.get(field) {
            None | Some(Value::Null) => {
                return Err(Error::MissingField {
                    resource_type: resource_type.to_string(),
                    field: field.to_string(),
                });
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(Error::EmptyField {
                    resource_type: resource_type.to_string(),
                    field: field.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Trimmed string value of a field, empty when absent or not a string.
pub fn string_field<'a>(fields: &'a Fields, key: &str) -> &'a str {
    fields.get(key).and_then(Value::as_str).map_or("", str::trim)
}

/// Optional string value of a field.
pub fn opt_string(fields: &Fields, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Optional bool value of a field.
pub fn opt_bool(fields: &Fields, key: &str) -> Option<bool> {
    fields.get(key).and_then(Value::as_bool)
}

/// Interpret a value as an array of strings.
pub fn string_slice(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(ToString::to_string))
        .collect()
}

/// Whether a value is a canonical UUID (8-4-4-4-12 hex).
pub fn is_valid_uuid(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Whether a string is a reference placeholder.
pub fn is_ref_placeholder(value: &str) -> bool {
    value.starts_with(REF_PLACEHOLDER_PREFIX)
}

/// Split a placeholder into `(ref, field)`.
pub fn parse_ref_placeholder(value: &str) -> Option<(&str, &str)> {
    value.strip_prefix(REF_PLACEHOLDER_PREFIX)?.split_once('#')
}

/// Build a placeholder string.
pub fn ref_placeholder(reference: &str, field: &str) -> String {
    format!("{REF_PLACEHOLDER_PREFIX}{reference}#{field}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_validate_required_fields() {
        let f = fields(json!({"name": "dev", "blank": "  ", "nothing": null}));
        assert!(validate_required_fields(&f, "portal", &["name"]).is_ok());

        let err = validate_required_fields(&f, "portal", &["missing"]).unwrap_err();
        assert_eq!(err.to_string(), "required field 'missing' is missing");

        let err = validate_required_fields(&f, "portal", &["blank"]).unwrap_err();
        assert_eq!(err.to_string(), "required field 'blank' cannot be empty");

        let err = validate_required_fields(&f, "portal", &["nothing"]).unwrap_err();
        assert!(matches!(err, Error::MissingField { .. }));
    }

    #[test]
    fn test_string_field() {
        let f = fields(json!({"name": " dev ", "count": 3}));
        assert_eq!(string_field(&f, "name"), "dev");
        assert_eq!(string_field(&f, "count"), "");
        assert_eq!(string_field(&f, "absent"), "");
    }

    #[test]
    fn test_string_slice() {
        assert_eq!(
            string_slice(&json!(["a", "b"])),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(string_slice(&json!(["a", 1])), None);
        assert_eq!(string_slice(&json!("a")), None);
    }

    #[test]
    fn test_is_valid_uuid() {
        assert!(is_valid_uuid("8f2b6a3c-1d4e-4f5a-9b6c-7d8e9f0a1b2c"));
        assert!(!is_valid_uuid("dev-portal"));
        assert!(!is_valid_uuid("8f2b6a3c-1d4e-4f5a-9b6c-7d8e9f0a1b2"));
        assert!(!is_valid_uuid("8f2b6a3c1d4e4f5a9b6c7d8e9f0a1b2c"));
        assert!(!is_valid_uuid("zf2b6a3c-1d4e-4f5a-9b6c-7d8e9f0a1b2c"));
    }

    #[test]
    fn test_ref_placeholder() {
        let placeholder = ref_placeholder("svc", "id");
        assert_eq!(placeholder, "__REF__:svc#id");
        assert!(is_ref_placeholder(&placeholder));
        assert_eq!(parse_ref_placeholder(&placeholder), Some(("svc", "id")));
        assert_eq!(parse_ref_placeholder("__REF__:svc"), None);
        assert_eq!(parse_ref_placeholder("svc#id"), None);
    }
}
