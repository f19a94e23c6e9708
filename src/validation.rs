//! Schema validation helpers.
//!
//! Validates a resource or provider configuration (`serde_json::Value`)
//! against a [`Schema`], producing diagnostics the host can show next to the
//! offending attribute.
//!
//! # Example
//!
//! ```
//! use tfe_provider::schema::{Schema, Attribute};
//! use tfe_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "destination_type",
//!         Attribute::required_string().with_allowed_values(["generic", "slack"]),
//!     );
//!
//! let diagnostics = validate(&schema, &json!({"name": "n", "destination_type": "generic"}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "n", "destination_type": "email"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("destination_type".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, Diagnostic, DiagnosticSeverity, NestedBlock, Schema,
};
use serde_json::{Map, Value};

/// Validate a JSON value against a schema.
///
/// Returns every diagnostic found; an empty list means the value is valid.
/// Warnings (deprecations) are included alongside errors.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - Restricted attributes must use one of their allowed values
/// - Conflicting attributes/blocks may not both be set
/// - Setting a deprecated attribute yields a warning
/// - Nested blocks are validated recursively
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, failing only on error diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let errors: Vec<_> = validate(schema, value)
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check whether a JSON value has no error diagnostics against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate_result(schema, value).is_ok()
}

/// Whether a configuration value counts as "set".
///
/// Null, empty strings, and empty collections are treated as unset, matching
/// how the host presents omitted optional attributes.
pub fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    // Attributes are visited in name order so diagnostics are stable.
    let mut names: Vec<_> = block.attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &block.attributes[name];
        let attr_path = join_path(path, name);
        let attr_value = obj.get(name);
        validate_attribute(attr, attr_value, &attr_path, diagnostics);
        if is_set(attr_value) {
            check_conflicts(name, &attr.conflicts_with, obj, path, diagnostics);
        }
    }

    let mut names: Vec<_> = block.blocks.keys().collect();
    names.sort();
    for name in names {
        let nested_block = &block.blocks[name];
        let block_path = join_path(path, name);
        let block_value = obj.get(name);
        validate_nested_block(nested_block, block_value, &block_path, diagnostics);
        if is_set(block_value) {
            check_conflicts(name, &nested_block.conflicts_with, obj, path, diagnostics);
        }
    }
}

fn check_conflicts(
    name: &str,
    conflicts_with: &[String],
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for other in conflicts_with {
        if is_set(obj.get(other)) {
            diagnostics.push(
                Diagnostic::error("Conflicting configuration arguments")
                    .with_detail(format!("\"{}\": conflicts with {}", name, other))
                    .with_attribute(join_path(path, name)),
            );
        }
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
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
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before && !attr.allowed_values.is_empty() {
                validate_allowed_values(&attr.allowed_values, v, path, diagnostics);
            }
            if let Some(message) = &attr.deprecated {
                diagnostics.push(
                    Diagnostic::warning(format!("Argument is deprecated: '{}'", path))
                        .with_detail(message.clone())
                        .with_attribute(path),
                );
            }
        },
    }
}

fn validate_allowed_values(
    allowed: &[String],
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let check = |s: &str, at: &str, diagnostics: &mut Vec<Diagnostic>| {
        if !allowed.iter().any(|a| a == s) {
            diagnostics.push(
                Diagnostic::error(format!("Invalid value for attribute '{}'", at))
                    .with_detail(format!("expected {} to be one of {:?}, got {}", at, allowed, s))
                    .with_attribute(at),
            );
        }
    };

    match value {
        Value::String(s) => check(s, path, diagnostics),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(s) = item.as_str() {
                    check(s, &format!("{}.{}", path, i), diagnostics);
                }
            }
        },
        _ => {},
    }
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
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "set", value));
            }
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Some(v) = value {
        validate_block(&nested.block, v, path, diagnostics);
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
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

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeType, Block, NestedBlock, Schema};
    use serde_json::json;

    fn team_access_like() -> Schema {
        Schema::v0()
            .with_attribute(
                "access",
                Attribute::optional_computed_string()
                    .with_allowed_values(["admin", "read", "plan", "write"])
                    .with_conflicts_with("permissions"),
            )
            .with_attribute("team_id", Attribute::required_string())
            .with_block(
                "permissions",
                NestedBlock::single(
                    Block::new()
                        .with_attribute(
                            "runs",
                            Attribute::optional_computed_string()
                                .with_allowed_values(["read", "plan", "apply"]),
                        )
                        .with_attribute("workspace_locking", Attribute::optional_computed_bool()),
                )
                .computed()
                .with_conflicts_with("access"),
            )
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "test"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_allowed_values() {
        let schema = team_access_like();

        assert!(is_valid(&schema, &json!({"team_id": "team-1", "access": "write"})));

        let diagnostics = validate(&schema, &json!({"team_id": "team-1", "access": "custom"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("access".to_string()));
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("got custom"));

        let diagnostics = validate(
            &schema,
            &json!({"team_id": "team-1", "permissions": {"runs": "destroy"}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("permissions.runs".to_string()));
    }

    #[test]
    fn test_allowed_values_on_sets() {
        let schema = Schema::v0().with_attribute(
            "triggers",
            Attribute::new(
                AttributeType::set(AttributeType::String),
                crate::schema::AttributeFlags::optional(),
            )
            .with_allowed_values(["run:created", "run:errored"]),
        );

        assert!(is_valid(&schema, &json!({"triggers": ["run:created", "run:errored"]})));

        let diagnostics = validate(&schema, &json!({"triggers": ["run:created", "run:paused"]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("triggers.1".to_string()));
    }

    #[test]
    fn test_conflicts_with() {
        let schema = team_access_like();

        let diagnostics = validate(
            &schema,
            &json!({
                "team_id": "team-1",
                "access": "read",
                "permissions": {"runs": "plan"}
            }),
        );
        // Both sides report the conflict.
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|d| d.summary == "Conflicting configuration arguments"));
        assert_eq!(diagnostics[0].attribute, Some("access".to_string()));
        assert_eq!(diagnostics[1].attribute, Some("permissions".to_string()));

        // An empty block does not count as set.
        assert!(is_valid(
            &schema,
            &json!({"team_id": "team-1", "access": "read", "permissions": {}})
        ));
    }

    #[test]
    fn test_deprecation_is_a_warning() {
        let schema = Schema::v0().with_attribute(
            "workspace_external_id",
            Attribute::optional_computed_string().with_deprecation("Use workspace_id instead."),
        );

        let diagnostics = validate(&schema, &json!({"workspace_external_id": "ws-abc"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
        assert!(validate_result(&schema, &json!({"workspace_external_id": "ws-abc"})).is_ok());
    }

    #[test]
    fn test_nested_block_shape() {
        let schema = team_access_like();

        assert!(is_valid(&schema, &json!({"team_id": "team-1", "permissions": null})));

        let diagnostics = validate(
            &schema,
            &json!({"team_id": "team-1", "permissions": [{"runs": "plan"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
        assert_eq!(diagnostics[0].attribute, Some("permissions".to_string()));

        let diagnostics = validate(
            &schema,
            &json!({"team_id": "team-1", "permissions": {"workspace_locking": "yes"}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("permissions.workspace_locking".to_string())
        );
    }

    #[test]
    fn test_non_object_root() {
        let schema = Schema::v0();
        let diagnostics = validate(&schema, &json!("oops"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, None);
    }

    #[test]
    fn test_is_set() {
        assert!(!is_set(None));
        assert!(!is_set(Some(&json!(null))));
        assert!(!is_set(Some(&json!(""))));
        assert!(!is_set(Some(&json!([]))));
        assert!(is_set(Some(&json!(false))));
        assert!(is_set(Some(&json!("read"))));
    }
}
