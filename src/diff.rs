//! The configuration-diff context handed to resources while planning.
//!
//! A [`ResourceDiff`] pairs the prior state with the host's proposed state
//! and lets a resource inspect changes and adjust the proposal before it is
//! finalized into a [`PlanResult`]. Paths are dot-separated; numeric
//! segments index into arrays (`triggers.0`).
//!
//! Top-level attributes declared as sets compare without regard to element
//! order or repetition.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};
use crate::validation::is_set;

/// Mutable view of one resource's planned change.
#[derive(Debug, Clone)]
pub struct ResourceDiff<'a> {
    schema: &'a Schema,
    prior: Option<Value>,
    proposed: Value,
    computed: Vec<String>,
    forced: Vec<String>,
}

impl<'a> ResourceDiff<'a> {
    /// Create a diff. `prior` is `None` when the resource is being created.
    pub fn new(schema: &'a Schema, prior: Option<Value>, proposed: Value) -> Self {
        Self {
            schema,
            prior: prior.filter(|v| !v.is_null()),
            proposed,
            computed: Vec::new(),
            forced: Vec::new(),
        }
    }

    /// Whether there is no prior state.
    pub fn is_create(&self) -> bool {
        self.prior.is_none()
    }

    /// Whether the resource is being destroyed.
    pub fn is_delete(&self) -> bool {
        self.proposed.is_null()
    }

    /// The proposed value at `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.proposed, path)
    }

    /// The proposed value at `path`, if it is set to a non-empty value.
    pub fn get_ok(&self, path: &str) -> Option<&Value> {
        let value = self.get(path);
        if is_set(value) {
            value
        } else {
            None
        }
    }

    /// The prior and proposed values at `path`.
    pub fn get_change(&self, path: &str) -> (Option<&Value>, Option<&Value>) {
        let old = self.prior.as_ref().and_then(|prior| lookup(prior, path));
        (old, self.get(path))
    }

    /// Whether the value at `path` differs between prior and proposed state.
    ///
    /// Missing and null compare equal, field by field for objects.
    pub fn has_change(&self, path: &str) -> bool {
        let (old, new) = self.get_change(path);
        !self.attribute_equal(path, old, new)
    }

    fn attribute_equal(&self, path: &str, old: Option<&Value>, new: Option<&Value>) -> bool {
        if self.schema.is_set_attribute(path) {
            sets_equal(old, new)
        } else {
            values_equal(old, new)
        }
    }

    /// Override the proposed value at `path`.
    pub fn set_new(&mut self, path: &str, value: Value) -> Result<(), ProviderError> {
        write_path(&mut self.proposed, path, value)
    }

    /// Mark `path` as computed by the API: its proposed value is discarded
    /// and it will only be known after apply.
    pub fn set_new_computed(&mut self, path: &str) -> Result<(), ProviderError> {
        write_path(&mut self.proposed, path, Value::Null)?;
        if !self.computed.iter().any(|p| p == path) {
            self.computed.push(path.to_string());
        }
        Ok(())
    }

    /// Paths marked computed so far.
    pub fn computed(&self) -> &[String] {
        &self.computed
    }

    /// Require replacement if the value at `path` changes.
    pub fn force_new(&mut self, path: &str) {
        if self.has_change(path) && !self.forced.iter().any(|p| p == path) {
            self.forced.push(path.to_string());
        }
    }

    /// Require replacement if the value at `path` changes and `predicate`
    /// accepts the (old, new) pair. Absent values are passed as null.
    pub fn force_new_if_change<F>(&mut self, path: &str, predicate: F)
    where
        F: FnOnce(&Value, &Value) -> bool,
    {
        if !self.has_change(path) {
            return;
        }
        let (old, new) = self.get_change(path);
        if predicate(old.unwrap_or(&Value::Null), new.unwrap_or(&Value::Null)) {
            self.force_new(path);
        }
    }

    /// Finalize the diff into a plan.
    pub fn into_plan(self) -> PlanResult {
        let empty = Map::new();
        let prior = self
            .prior
            .as_ref()
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let planned = self.proposed.as_object().unwrap_or(&empty);

        let mut keys: Vec<&String> = prior.keys().chain(planned.keys()).collect();
        keys.sort();
        keys.dedup();

        let mut changes = Vec::new();
        let mut requires_replace = !self.forced.is_empty();
        for key in keys {
            let before = prior.get(key).filter(|v| !v.is_null());
            let after = planned.get(key).filter(|v| !v.is_null());
            if self.attribute_equal(key, before, after) {
                continue;
            }
            if self.prior.is_some() && !self.proposed.is_null() && self.schema.is_force_new(key)
            {
                requires_replace = true;
            }
            changes.push(AttributeChange::new(key.clone(), before.cloned(), after.cloned()));
        }

        PlanResult {
            planned_state: self.proposed,
            changes,
            unknown: self.computed,
            requires_replace,
        }
    }
}

fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn write_path(target: &mut Value, path: &str, value: Value) -> Result<(), ProviderError> {
    let mut segments = path.split('.').peekable();
    let mut current = target;
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => {
                if last {
                    map.insert(segment.to_string(), value);
                    return Ok(());
                }
                map.entry(segment.to_string()).or_insert(Value::Null)
            },
            Value::Array(items) => {
                let slot = segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| {
                        ProviderError::Sdk(format!("no element '{}' in path '{}'", segment, path))
                    })?;
                if last {
                    *slot = value;
                    return Ok(());
                }
                slot
            },
            _ => {
                return Err(ProviderError::Sdk(format!(
                    "cannot set '{}': '{}' is not a block",
                    path, segment
                )))
            },
        };
    }
    Ok(())
}

fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null)) {
        (Value::Object(x), Value::Object(y)) => x
            .keys()
            .chain(y.keys())
            .all(|k| values_equal(x.get(k), y.get(k))),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(l, r)| values_equal(Some(l), Some(r)))
        },
        (x, y) => x == y,
    }
}

fn sets_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null)) {
        (Value::Array(x), Value::Array(y)) => {
            let contains = |items: &[Value], item: &Value| {
                items.iter().any(|other| values_equal(Some(other), Some(item)))
            };
            x.iter().all(|item| contains(y.as_slice(), item))
                && y.iter().all(|item| contains(x.as_slice(), item))
        },
        _ => values_equal(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, AttributeType};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("team_id", Attribute::required_string().with_force_new())
            .with_attribute("access", Attribute::optional_computed_string())
            .with_attribute(
                "triggers",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::optional()),
            )
    }

    #[test]
    fn test_lookup_paths() {
        let value = json!({"permissions": {"runs": "plan"}, "triggers": ["run:created"]});
        assert_eq!(lookup(&value, "permissions.runs"), Some(&json!("plan")));
        assert_eq!(lookup(&value, "triggers.0"), Some(&json!("run:created")));
        assert_eq!(lookup(&value, "triggers.x"), None);
        assert_eq!(lookup(&value, "permissions.runs.deeper"), None);
    }

    #[test]
    fn test_has_change_treats_missing_as_null() {
        let schema = schema();
        let diff = ResourceDiff::new(
            &schema,
            Some(json!({"access": "read", "permissions": {"runs": "read", "workspace_locking": null}})),
            json!({"access": "read", "permissions": {"runs": "read"}}),
        );
        assert!(!diff.has_change("access"));
        assert!(!diff.has_change("permissions"));
        assert!(!diff.has_change("permissions.workspace_locking"));
    }

    #[test]
    fn test_has_change_nested() {
        let schema = schema();
        let diff = ResourceDiff::new(
            &schema,
            Some(json!({"permissions": {"runs": "read"}})),
            json!({"permissions": {"runs": "apply"}}),
        );
        assert!(diff.has_change("permissions"));
        assert!(diff.has_change("permissions.runs"));
        assert_eq!(
            diff.get_change("permissions.runs"),
            (Some(&json!("read")), Some(&json!("apply")))
        );
    }

    #[test]
    fn test_set_attributes_ignore_order() {
        let schema = schema();
        let diff = ResourceDiff::new(
            &schema,
            Some(json!({"triggers": ["run:completed", "run:created"]})),
            json!({"triggers": ["run:created", "run:completed", "run:created"]}),
        );
        assert!(!diff.has_change("triggers"));
        assert!(diff.into_plan().changes.is_empty());

        let diff = ResourceDiff::new(
            &schema,
            Some(json!({"triggers": ["run:completed", "run:created"]})),
            json!({"triggers": ["run:created"]}),
        );
        assert!(diff.has_change("triggers"));
        assert_eq!(diff.into_plan().changes.len(), 1);

        // Order still matters for anything not declared a set.
        let diff = ResourceDiff::new(
            &schema,
            Some(json!({"tags": ["a", "b"]})),
            json!({"tags": ["b", "a"]}),
        );
        assert!(diff.has_change("tags"));
    }

    #[test]
    fn test_get_ok() {
        let schema = schema();
        let diff = ResourceDiff::new(&schema, None, json!({"access": "", "team_id": "team-1"}));
        assert!(diff.is_create());
        assert!(diff.get_ok("access").is_none());
        assert!(diff.get("access").is_some());
        assert_eq!(diff.get_ok("team_id"), Some(&json!("team-1")));
    }

    #[test]
    fn test_set_new_and_computed() {
        let schema = schema();
        let mut diff = ResourceDiff::new(
            &schema,
            Some(json!({"access": "read", "permissions": {"runs": "read"}})),
            json!({"access": "write", "permissions": {"runs": "read"}}),
        );
        diff.set_new_computed("permissions").unwrap();
        diff.set_new_computed("permissions").unwrap();
        assert_eq!(diff.computed(), ["permissions".to_string()]);
        assert_eq!(diff.get("permissions"), Some(&Value::Null));

        diff.set_new("access", json!("custom")).unwrap();
        assert_eq!(diff.get("access"), Some(&json!("custom")));

        diff.set_new("nested.field", json!(true)).unwrap();
        assert_eq!(diff.get("nested.field"), Some(&json!(true)));

        assert!(diff.set_new("access.inner", json!(1)).is_err());
    }

    #[test]
    fn test_into_plan_reports_changes_and_unknowns() {
        let schema = schema();
        let mut diff = ResourceDiff::new(
            &schema,
            Some(json!({"id": "tws-1", "team_id": "team-1", "access": "read", "permissions": {"runs": "read"}})),
            json!({"id": "tws-1", "team_id": "team-1", "access": "write", "permissions": {"runs": "read"}}),
        );
        diff.set_new_computed("permissions").unwrap();
        let plan = diff.into_plan();

        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 2);
        assert_eq!(plan.changes[0].path, "access");
        assert_eq!(plan.changes[1].path, "permissions");
        assert_eq!(plan.changes[1].after, None);
        assert!(plan.is_unknown("permissions"));
    }

    #[test]
    fn test_force_new_attribute_requires_replace() {
        let schema = schema();
        let diff = ResourceDiff::new(
            &schema,
            Some(json!({"team_id": "team-1"})),
            json!({"team_id": "team-2"}),
        );
        assert!(diff.into_plan().requires_replace);

        // Creation never replaces.
        let diff = ResourceDiff::new(&schema, None, json!({"team_id": "team-2"}));
        let plan = diff.into_plan();
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 1);
    }

    #[test]
    fn test_force_new_if_change() {
        let schema = schema();
        let both_set = |old: &Value, new: &Value| {
            old.as_str().is_some_and(|s| !s.is_empty()) && new.as_str().is_some_and(|s| !s.is_empty())
        };

        let mut diff = ResourceDiff::new(
            &schema,
            Some(json!({"workspace_id": "ws-a"})),
            json!({"workspace_id": "ws-b"}),
        );
        diff.force_new_if_change("workspace_id", both_set);
        assert!(diff.into_plan().requires_replace);

        let mut diff = ResourceDiff::new(
            &schema,
            Some(json!({"workspace_id": ""})),
            json!({"workspace_id": "ws-b"}),
        );
        diff.force_new_if_change("workspace_id", both_set);
        assert!(!diff.into_plan().requires_replace);

        let mut diff = ResourceDiff::new(
            &schema,
            Some(json!({"workspace_id": "ws-a"})),
            json!({"workspace_id": "ws-a"}),
        );
        diff.force_new_if_change("workspace_id", |_, _| true);
        assert!(!diff.into_plan().requires_replace);
    }

    #[test]
    fn test_delete_plan() {
        let schema = schema();
        let diff = ResourceDiff::new(&schema, Some(json!({"team_id": "team-1"})), Value::Null);
        assert!(diff.is_delete());
        let plan = diff.into_plan();
        assert!(plan.planned_state.is_null());
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes, vec![AttributeChange::removed("team_id", json!("team-1"))]);
    }
}
