//! Schema validation helpers.
//!
//! This module validates a `serde_json::Value` against a [`Schema`] and
//! reports problems as attribute-scoped [`Diagnostic`]s.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_zookeeper::schema::{Schema, Attribute};
//! use hemmer_provider_zookeeper::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("path", Attribute::required_string())
//!     .with_attribute("session_timeout", Attribute::optional_int64());
//!
//! // Valid input
//! let input = json!({
//!     "path": "/app/config",
//!     "session_timeout": 30
//! });
//! let diagnostics = validate(&schema, &input);
//! assert!(diagnostics.is_empty());
//!
//! // Invalid input - wrong type for session_timeout
//! let input = json!({
//!     "path": "/app/config",
//!     "session_timeout": "thirty"
//! });
//! let diagnostics = validate(&schema, &input);
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("session_timeout".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Block, Diagnostic, DiagnosticSeverity, Schema};
use serde_json::Value;
use std::collections::HashMap;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed attributes are skipped (provider sets these)
/// - Attributes unknown to the schema are rejected
/// - Attribute types must match the schema; every field of an object type must be present
/// - Attributes declared as conflicting must not both be set
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
///
/// This is a convenience wrapper around [`validate`] that returns a Result.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
///
/// Returns `true` if valid, `false` otherwise.
/// Use [`validate`] to get detailed error information.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Read an integer, accepting floats with no fractional part.
pub(crate) fn as_int64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

fn validate_block(block: &Block, value: &Value, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // Null means an empty block: only required attributes can fail.
            for (name, attr) in &block.attributes {
                validate_attribute(attr, None, name, diagnostics);
            }
            return;
        },
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), name, diagnostics);
        validate_conflicts(name, attr, obj, diagnostics);
    }

    let mut unknown: Vec<&String> = obj
        .keys()
        .filter(|name| !block.attributes.contains_key(*name))
        .collect();
    unknown.sort();
    for name in unknown {
        diagnostics.push(
            Diagnostic::error(format!("Unsupported attribute '{}'", name))
                .with_detail("An attribute by this name is not expected here")
                .with_attribute(name.as_str()),
        );
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Skip computed-only attributes (provider sets these)
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
        },
    }
}

fn validate_conflicts(
    name: &str,
    attr: &Attribute,
    obj: &serde_json::Map<String, Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if !is_set(obj.get(name)) {
        return;
    }
    for other in &attr.conflicts_with {
        // Report each pair once, from the attribute that sorts first.
        if is_set(obj.get(other)) && name < other.as_str() {
            diagnostics.push(
                Diagnostic::error(format!("Conflicting attributes '{}' and '{}'", name, other))
                    .with_detail("Only one of these attributes may be set")
                    .with_attribute(name),
            );
        }
    }
}

fn is_set(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if as_int64(value).is_none() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut names: Vec<&String> = attrs.keys().collect();
    names.sort();
    for name in names {
        let attr_path = format!("{}.{}", path, name);
        match obj.get(name) {
            Some(value) if !value.is_null() => {
                validate_attribute_type(&attrs[name], value, &attr_path, diagnostics)
            },
            _ => diagnostics.push(
                Diagnostic::error(format!("Missing required attribute '{}'", attr_path))
                    .with_detail("Every field of an object must be provided")
                    .with_attribute(attr_path),
            ),
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Schema};
    use serde_json::json;

    fn acl_schema() -> Schema {
        Schema::v0().with_attribute(
            "acl",
            Attribute::new(
                AttributeType::list(AttributeType::object([
                    ("scheme", AttributeType::String),
                    ("id", AttributeType::String),
                    ("permissions", AttributeType::Int64),
                ])),
                AttributeFlags::optional_computed(),
            ),
        )
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("path", Attribute::required_string());

        // Valid
        let diagnostics = validate(&schema, &json!({"path": "/a"}));
        assert!(diagnostics.is_empty());

        // Missing required
        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("path".to_string()));

        // Null value
        let diagnostics = validate(&schema, &json!({"path": null}));
        assert_eq!(diagnostics.len(), 1);

        // Null block
        let diagnostics = validate(&schema, &Value::Null);
        assert_eq!(diagnostics.len(), 1);

        // Wrong type
        let diagnostics = validate(&schema, &json!({"path": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("session_timeout", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"session_timeout": 42})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"session_timeout": null})).is_empty());
        assert_eq!(
            validate(&schema, &json!({"session_timeout": "not a number"})).len(),
            1
        );
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("stat", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        // Even with wrong type, we don't validate computed-only attrs
        assert!(validate(&schema, &json!({"stat": 123})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("count", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"count": 42})).is_empty());
        // Float that's actually an integer
        assert!(validate(&schema, &json!({"count": 42.0})).is_empty());
        // Float with fractional part
        assert_eq!(validate(&schema, &json!({"count": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"count": "42"})).len(), 1);
    }

    #[test]
    fn test_as_int64() {
        assert_eq!(as_int64(&json!(7)), Some(7));
        assert_eq!(as_int64(&json!(7.0)), Some(7));
        assert_eq!(as_int64(&json!(7.5)), None);
        assert_eq!(as_int64(&json!("7")), None);
    }

    #[test]
    fn test_validate_list_of_objects() {
        let schema = acl_schema();

        let diagnostics = validate(
            &schema,
            &json!({"acl": [{"scheme": "world", "id": "anyone", "permissions": 31}]}),
        );
        assert!(diagnostics.is_empty());

        assert!(validate(&schema, &json!({"acl": []})).is_empty());

        // Wrong element field type
        let diagnostics = validate(
            &schema,
            &json!({"acl": [{"scheme": "world", "id": "anyone", "permissions": "all"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("acl.0.permissions".to_string()));

        // Missing element field
        let diagnostics = validate(&schema, &json!({"acl": [{"scheme": "world", "id": "anyone"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("acl.0.permissions".to_string()));

        // Not a list
        let diagnostics = validate(&schema, &json!({"acl": "world:anyone"}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_conflicts() {
        let schema = Schema::v0()
            .with_attribute(
                "data",
                Attribute::optional_computed_string().with_conflicts_with(&["data_base64"]),
            )
            .with_attribute(
                "data_base64",
                Attribute::optional_computed_string().with_conflicts_with(&["data"]),
            );

        assert!(validate(&schema, &json!({"data": "x"})).is_empty());
        assert!(validate(&schema, &json!({"data": "x", "data_base64": null})).is_empty());

        let diagnostics = validate(&schema, &json!({"data": "x", "data_base64": "eA=="}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("data".to_string()));
        assert!(diagnostics[0].summary.contains("Conflicting"));
    }

    #[test]
    fn test_validate_unknown_attribute() {
        let schema = Schema::v0().with_attribute("path", Attribute::required_string());

        let diagnostics = validate(&schema, &json!({"path": "/a", "pth": "/b"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("pth".to_string()));
    }

    #[test]
    fn test_validate_multiple_errors() {
        let schema = Schema::v0()
            .with_attribute("path", Attribute::required_string())
            .with_attribute("count", Attribute::optional_int64());

        let diagnostics = validate(&schema, &json!({"path": 123, "count": "not a number"}));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_is_valid_helper() {
        let schema = Schema::v0().with_attribute("path", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"path": "/a"})));
        assert!(!is_valid(&schema, &json!({})));
    }

    #[test]
    fn test_validate_result_helper() {
        let schema = Schema::v0().with_attribute("path", Attribute::required_string());

        assert!(validate_result(&schema, &json!({"path": "/a"})).is_ok());

        let result = validate_result(&schema, &json!({}));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("path", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
