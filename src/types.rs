//! Value types exchanged with the host runtime.

use serde::{Deserialize, Serialize};

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting or not yet known).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Attribute paths whose values are only known after apply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<String>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            unknown: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            unknown: Vec::new(),
            requires_replace,
        }
    }

    /// Whether the attribute at `path` will be computed during apply.
    pub fn is_unknown(&self, path: &str) -> bool {
        self.unknown.iter().any(|p| p == path)
    }

    /// The planned change for a top-level attribute, if any.
    pub fn change(&self, path: &str) -> Option<&AttributeChange> {
        self.changes.iter().find(|c| c.path == path)
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata, derived from the schema by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("access", json!("custom"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("custom")));

        let removed = AttributeChange::removed("token", json!("secret"));
        assert_eq!(removed.before, Some(json!("secret")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("access", json!("read"), json!("write"));
        assert_eq!(modified.before, Some(json!("read")));
        assert_eq!(modified.after, Some(json!("write")));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "tws-123"}));
        assert!(no_change.changes.is_empty());
        assert!(!no_change.requires_replace);
        assert!(!no_change.is_unknown("permissions"));

        let mut with_changes = PlanResult::with_changes(
            json!({"id": "tws-123", "access": "write", "permissions": null}),
            vec![AttributeChange::modified("access", json!("read"), json!("write"))],
            false,
        );
        with_changes.unknown.push("permissions".to_string());
        assert_eq!(with_changes.changes.len(), 1);
        assert!(with_changes.is_unknown("permissions"));
        assert_eq!(
            with_changes.change("access").and_then(|c| c.after.clone()),
            Some(json!("write"))
        );
        assert!(with_changes.change("team_id").is_none());
    }

    #[test]
    fn test_plan_result_serialization_skips_empty_unknown() {
        let plan = PlanResult::no_change(json!({}));
        let json = serde_json::to_value(&plan).unwrap();
        assert!(json.get("unknown").is_none());
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("tfe_team_access", json!({"id": "tws-123"}));
        assert_eq!(imported.resource_type, "tfe_team_access");
        assert_eq!(imported.state["id"], "tws-123");
    }
}
