//! `tfe_team_access`: a team's access to a workspace.
//!
//! Access is either a fixed level or `custom` with a permissions block; see
//! [`crate::access`] for how plans choose between the two.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::access::{
    self, AccessLevel, PermissionSet, RunsPermission, SentinelMocksPermission,
    StateVersionsPermission, VariablesPermission, ACCESS_ATTR, PERMISSIONS_ATTR,
};
use crate::client::{
    fetch_workspace_external_id, TeamAccessAddOptions, TeamAccessUpdateOptions, TfeApi,
};
use crate::diff::ResourceDiff;
use crate::error::{ApiError, ProviderError};
use crate::resources::{empty_as_none, read_imported, require_id, Resource};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation;

/// Resource type name.
pub const TYPE_NAME: &str = "tfe_team_access";

/// Current schema version. Version 0 stored `workspace_id` as
/// `<organization>/<workspace>`.
pub const SCHEMA_VERSION: u64 = 1;

/// Typed `tfe_team_access` state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamAccessState {
    /// Grant id.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub id: Option<String>,
    /// Access level.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub access: Option<AccessLevel>,
    /// Permissions block.
    #[serde(default)]
    pub permissions: Option<PermissionSet>,
    /// Team id.
    #[serde(default)]
    pub team_id: String,
    /// Workspace external id.
    #[serde(default)]
    pub workspace_id: String,
}

impl TeamAccessState {
    fn explicit_permissions(&self) -> PermissionSet {
        self.permissions.unwrap_or_default()
    }
}

/// The `tfe_team_access` resource.
#[derive(Debug, Clone)]
pub struct TeamAccessResource {
    workspace_id_pattern: Regex,
}

impl TeamAccessResource {
    /// Create the resource, validating `workspace_id` against `workspace_id_pattern`.
    pub fn new(workspace_id_pattern: Regex) -> Self {
        Self {
            workspace_id_pattern,
        }
    }

    fn access_for_create(state: &TeamAccessState) -> Result<AccessLevel, ProviderError> {
        match state.access {
            Some(access) => Ok(access),
            None if !state.explicit_permissions().is_empty() => Ok(AccessLevel::Custom),
            None => Err(ProviderError::Validation(
                "one of access or permissions must be set".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Resource for TeamAccessResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let fixed: Vec<&str> = AccessLevel::FIXED.iter().map(AccessLevel::as_str).collect();

        Schema::new(SCHEMA_VERSION)
            .with_description(
                "Associates a team to a workspace with an access level or custom permissions.",
            )
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                ACCESS_ATTR,
                Attribute::optional_computed_string()
                    .with_allowed_values(fixed)
                    .with_conflicts_with(PERMISSIONS_ATTR)
                    .with_description(
                        "Fixed access level. Becomes `custom` when permissions are set.",
                    ),
            )
            .with_block(
                PERMISSIONS_ATTR,
                NestedBlock::single(
                    Block::new()
                        .with_attribute(
                            "runs",
                            Attribute::optional_computed_string()
                                .with_allowed_values(RunsPermission::ALL),
                        )
                        .with_attribute(
                            "variables",
                            Attribute::optional_computed_string()
                                .with_allowed_values(VariablesPermission::ALL),
                        )
                        .with_attribute(
                            "state_versions",
                            Attribute::optional_computed_string()
                                .with_allowed_values(StateVersionsPermission::ALL),
                        )
                        .with_attribute(
                            "sentinel_mocks",
                            Attribute::optional_computed_string()
                                .with_allowed_values(SentinelMocksPermission::ALL),
                        )
                        .with_attribute("workspace_locking", Attribute::optional_computed_bool()),
                )
                .computed()
                .with_conflicts_with(ACCESS_ATTR),
            )
            .with_attribute("team_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "workspace_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("External id of the workspace."),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        if let Some(workspace_id) = config.get("workspace_id").and_then(Value::as_str) {
            if !self.workspace_id_pattern.is_match(workspace_id) {
                diagnostics.push(
                    Diagnostic::error("Invalid workspace_id")
                        .with_detail(format!(
                            "must be the workspace's external_id, got {}",
                            workspace_id
                        ))
                        .with_attribute("workspace_id"),
                );
            }
        }
        if !validation::is_set(config.get(ACCESS_ATTR))
            && !validation::is_set(config.get(PERMISSIONS_ATTR))
        {
            diagnostics.push(Diagnostic::error("One of access or permissions must be set"));
        }
        diagnostics
    }

    fn customize_diff(&self, diff: &mut ResourceDiff<'_>) -> Result<(), ProviderError> {
        if diff.is_delete() {
            return Ok(());
        }
        access::reconcile_diff(diff)?;
        Ok(())
    }

    async fn create(&self, api: &dyn TfeApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: TeamAccessState = serde_json::from_value(planned)?;
        let access = Self::access_for_create(&state)?;

        let workspace = api
            .read_workspace_by_id(&state.workspace_id)
            .await
            .map_err(|e| {
                ProviderError::api(format!("Error retrieving workspace {}", state.workspace_id), e)
            })?;
        let team = api
            .read_team(&state.team_id)
            .await
            .map_err(|e| ProviderError::api(format!("Error retrieving team {}", state.team_id), e))?;

        let options = TeamAccessAddOptions {
            access,
            permissions: state.explicit_permissions(),
            team_id: team.id.clone(),
            workspace_id: workspace.id.clone(),
        };

        debug!(
            team = %team.name,
            access = %access,
            workspace = %workspace.name,
            "Giving team access to workspace"
        );
        let granted = api.add_team_access(options).await.map_err(|e| {
            ProviderError::api(
                format!(
                    "Error giving team {} {} access to workspace {}",
                    team.name, access, workspace.name
                ),
                e,
            )
        })?;
        info!(id = %granted.id, team = %team.name, workspace = %workspace.name, "Created team access");

        state.id = Some(granted.id);
        self.read(api, serde_json::to_value(&state)?).await
    }

    async fn read(&self, api: &dyn TfeApi, current: Value) -> Result<Value, ProviderError> {
        let mut state: TeamAccessState = serde_json::from_value(current)?;
        let id = require_id(TYPE_NAME, state.id.as_deref())?;

        debug!(id = %id, "Reading team access");
        let grant = match api.read_team_access(&id).await {
            Ok(grant) => grant,
            Err(ApiError::NotFound) => {
                debug!(id = %id, "Team access no longer exists");
                return Ok(Value::Null);
            },
            Err(e) => {
                return Err(ProviderError::api(
                    format!("Error reading configuration of team access {}", id),
                    e,
                ))
            },
        };

        state.access = Some(grant.access);
        state.permissions = Some(grant.permissions.into());
        state.team_id = grant.team_id.unwrap_or_default();
        if state.workspace_id.is_empty() {
            state.workspace_id = grant.workspace_id;
        }
        Ok(serde_json::to_value(&state)?)
    }

    async fn update(
        &self,
        api: &dyn TfeApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: TeamAccessState = serde_json::from_value(prior)?;
        let mut state: TeamAccessState = serde_json::from_value(planned)?;
        let id = require_id(TYPE_NAME, state.id.as_deref().or(prior.id.as_deref()))?;

        let options = TeamAccessUpdateOptions {
            access: state.access,
            permissions: state
                .explicit_permissions()
                .changed_from(&prior.explicit_permissions()),
        };

        debug!(id = %id, access = ?options.access, "Updating team access");
        let grant = api
            .update_team_access(&id, options)
            .await
            .map_err(|e| ProviderError::api(format!("Error updating team access {}", id), e))?;

        // Permissions may have been left for the API to compute.
        state.id = Some(id);
        state.permissions = Some(grant.permissions.into());
        Ok(serde_json::to_value(&state)?)
    }

    async fn delete(&self, api: &dyn TfeApi, current: Value) -> Result<(), ProviderError> {
        let state: TeamAccessState = serde_json::from_value(current)?;
        let id = require_id(TYPE_NAME, state.id.as_deref())?;

        debug!(id = %id, "Deleting team access");
        match api.remove_team_access(&id).await {
            Ok(()) | Err(ApiError::NotFound) => Ok(()),
            Err(e) => Err(ProviderError::api(format!("Error deleting team access {}", id), e)),
        }
    }

    async fn import(&self, api: &dyn TfeApi, id: &str) -> Result<Value, ProviderError> {
        let parts: Vec<&str> = id.splitn(3, '/').collect();
        let [organization, workspace, access_id] = parts.as_slice() else {
            return Err(ProviderError::InvalidRequest(format!(
                "invalid team access import format: {} (expected <ORGANIZATION>/<WORKSPACE>/<TEAM ACCESS ID>)",
                id
            )));
        };

        let workspace_id =
            fetch_workspace_external_id(api, &format!("{}/{}", organization, workspace))
                .await
                .map_err(|e| {
                    ProviderError::api(
                        format!(
                            "error retrieving workspace {} from organization {}",
                            workspace, organization
                        ),
                        e,
                    )
                })?;

        let state = TeamAccessState {
            id: Some(access_id.to_string()),
            workspace_id,
            ..Default::default()
        };
        read_imported(self, api, id, serde_json::to_value(&state)?).await
    }

    async fn upgrade_state(
        &self,
        api: &dyn TfeApi,
        version: u64,
        mut state: Value,
    ) -> Result<Value, ProviderError> {
        match version {
            SCHEMA_VERSION => Ok(state),
            0 => {
                if !state.is_object() {
                    return Err(ProviderError::InvalidRequest(format!(
                        "{} state must be an object",
                        TYPE_NAME
                    )));
                }
                let human_id = state
                    .get("workspace_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let external_id = fetch_workspace_external_id(api, &human_id)
                    .await
                    .map_err(|e| {
                        ProviderError::api(
                            format!("Error reading configuration of workspace {}", human_id),
                            e,
                        )
                    })?;
                info!(from = %human_id, to = %external_id, "Upgraded team access state to version 1");
                state["workspace_id"] = Value::String(external_id);
                Ok(state)
            },
            other => Err(ProviderError::FailedPrecondition(format!(
                "{} has no state upgrade from schema version {}",
                TYPE_NAME, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::WorkspacePermissions;
    use crate::config::ProviderOptions;
    use crate::testing::MemoryApi;
    use serde_json::json;

    fn resource() -> TeamAccessResource {
        TeamAccessResource::new(ProviderOptions::default().workspace_id_pattern)
    }

    fn api() -> MemoryApi {
        MemoryApi::new()
            .with_workspace("ws-prod1", "hashicorp", "prod")
            .with_team("team-owners", "owners")
    }

    fn plan(
        resource: &TeamAccessResource,
        prior: Option<Value>,
        proposed: Value,
    ) -> crate::types::PlanResult {
        let schema = resource.schema();
        let mut diff = ResourceDiff::new(&schema, prior, proposed);
        resource.customize_diff(&mut diff).unwrap();
        diff.into_plan()
    }

    #[test]
    fn test_validate() {
        let resource = resource();

        let ok = json!({"team_id": "team-owners", "workspace_id": "ws-prod1", "access": "write"});
        assert!(resource.validate(&ok).is_empty());

        let custom = json!({"team_id": "team-owners", "workspace_id": "ws-prod1", "access": "custom"});
        assert_eq!(resource.validate(&custom).len(), 1);

        let human = json!({"team_id": "team-owners", "workspace_id": "hashicorp/prod", "access": "read"});
        let diagnostics = resource.validate(&human);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("workspace_id"));

        let neither = json!({"team_id": "team-owners", "workspace_id": "ws-prod1"});
        let diagnostics = resource.validate(&neither);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "One of access or permissions must be set");

        let both = json!({
            "team_id": "team-owners",
            "workspace_id": "ws-prod1",
            "access": "read",
            "permissions": {"runs": "plan"}
        });
        assert_eq!(resource.validate(&both).len(), 2);
    }

    #[test]
    fn test_plan_new_with_permissions_sets_custom() {
        let plan = plan(
            &resource(),
            None,
            json!({"team_id": "team-owners", "workspace_id": "ws-prod1", "permissions": {"runs": "plan"}}),
        );
        assert_eq!(plan.planned_state["access"], "custom");
        assert_eq!(plan.planned_state["permissions"]["runs"], "plan");
        assert!(!plan.is_unknown("permissions"));
    }

    #[test]
    fn test_plan_fixed_level_change_computes_permissions() {
        let prior = json!({
            "id": "tws-1", "team_id": "team-owners", "workspace_id": "ws-prod1",
            "access": "read",
            "permissions": {"runs": "read", "variables": "read", "state_versions": "read", "sentinel_mocks": "none", "workspace_locking": false}
        });
        let mut proposed = prior.clone();
        proposed["access"] = json!("write");

        let plan = plan(&resource(), Some(prior), proposed);
        assert!(plan.is_unknown("permissions"));
        assert!(plan.planned_state["permissions"].is_null());
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_plan_workspace_change_replaces() {
        let prior = json!({"id": "tws-1", "team_id": "team-owners", "workspace_id": "ws-prod1", "access": "read"});
        let mut proposed = prior.clone();
        proposed["workspace_id"] = json!("ws-other");
        assert!(plan(&resource(), Some(prior), proposed).requires_replace);
    }

    #[tokio::test]
    async fn test_create_fixed_access() {
        let api = api();
        let state = resource()
            .create(
                &api,
                json!({"team_id": "team-owners", "workspace_id": "ws-prod1", "access": "write", "permissions": null}),
            )
            .await
            .unwrap();

        assert_eq!(state["access"], "write");
        assert_eq!(state["permissions"]["runs"], "apply");
        assert_eq!(state["permissions"]["workspace_locking"], true);
        assert_eq!(state["team_id"], "team-owners");

        let id = state["id"].as_str().unwrap();
        let grant = api.team_access(id).await.unwrap();
        assert_eq!(grant.permissions, WorkspacePermissions::for_access(AccessLevel::Write));
    }

    #[tokio::test]
    async fn test_create_custom_leaves_unset_locking_to_api() {
        let api = api();
        let state = resource()
            .create(
                &api,
                json!({
                    "team_id": "team-owners",
                    "workspace_id": "ws-prod1",
                    "access": "custom",
                    "permissions": {"runs": "plan", "variables": "write"}
                }),
            )
            .await
            .unwrap();

        assert_eq!(state["access"], "custom");
        assert_eq!(state["permissions"]["runs"], "plan");
        assert_eq!(state["permissions"]["variables"], "write");
        assert_eq!(state["permissions"]["state_versions"], "none");

        let added = api.last_team_access_add().await.unwrap();
        assert_eq!(added.permissions.workspace_locking, None);
    }

    #[tokio::test]
    async fn test_create_missing_workspace() {
        let err = resource()
            .create(
                &api(),
                json!({"team_id": "team-owners", "workspace_id": "ws-missing", "access": "read"}),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "Error retrieving workspace ws-missing: resource not found"
        );
    }

    #[tokio::test]
    async fn test_read_gone_returns_null() {
        let state = resource()
            .read(&api(), json!({"id": "tws-gone", "team_id": "team-owners", "workspace_id": "ws-prod1"}))
            .await
            .unwrap();
        assert!(state.is_null());
    }

    #[tokio::test]
    async fn test_read_error_has_context() {
        let api = api();
        api.fail_next(ApiError::Request("connection reset".to_string())).await;
        let err = resource()
            .read(&api, json!({"id": "tws-1"}))
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "Error reading configuration of team access tws-1: connection reset"
        );
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_permissions() {
        let api = api();
        let resource = resource();
        let prior = resource
            .create(
                &api,
                json!({"team_id": "team-owners", "workspace_id": "ws-prod1", "access": "custom", "permissions": {"runs": "plan"}}),
            )
            .await
            .unwrap();

        let mut planned = prior.clone();
        planned["permissions"]["workspace_locking"] = json!(true);
        let state = resource.update(&api, prior, planned).await.unwrap();

        let update = api.last_team_access_update().await.unwrap();
        assert_eq!(update.access, Some(AccessLevel::Custom));
        assert_eq!(
            update.permissions,
            PermissionSet {
                workspace_locking: Some(true),
                ..Default::default()
            }
        );
        assert_eq!(state["permissions"]["workspace_locking"], true);
        assert_eq!(state["permissions"]["runs"], "plan");
    }

    #[tokio::test]
    async fn test_update_to_fixed_level_refreshes_permissions() {
        let api = api();
        let resource = resource();
        let prior = resource
            .create(
                &api,
                json!({"team_id": "team-owners", "workspace_id": "ws-prod1", "access": "custom", "permissions": {"runs": "apply"}}),
            )
            .await
            .unwrap();

        let mut planned = prior.clone();
        planned["access"] = json!("read");
        planned["permissions"] = Value::Null;
        let state = resource.update(&api, prior, planned).await.unwrap();

        assert_eq!(state["access"], "read");
        assert_eq!(state["permissions"]["runs"], "read");
        assert!(api.last_team_access_update().await.unwrap().permissions.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let api = api();
        let resource = resource();
        let state = resource
            .create(&api, json!({"team_id": "team-owners", "workspace_id": "ws-prod1", "access": "read"}))
            .await
            .unwrap();

        resource.delete(&api, state.clone()).await.unwrap();
        resource.delete(&api, state).await.unwrap();
    }

    #[tokio::test]
    async fn test_import() {
        let api = api();
        let resource = resource();
        let created = resource
            .create(&api, json!({"team_id": "team-owners", "workspace_id": "ws-prod1", "access": "plan"}))
            .await
            .unwrap();
        let access_id = created["id"].as_str().unwrap();

        let imported = resource
            .import(&api, &format!("hashicorp/prod/{}", access_id))
            .await
            .unwrap();
        assert_eq!(imported, created);

        let err = resource.import(&api, "hashicorp/prod").await.unwrap_err();
        assert!(err.message().contains("expected <ORGANIZATION>/<WORKSPACE>/<TEAM ACCESS ID>"));

        let err = resource
            .import(&api, "hashicorp/staging/tws-1")
            .await
            .unwrap_err();
        assert!(err
            .message()
            .starts_with("error retrieving workspace staging from organization hashicorp"));

        let err = resource
            .import(&api, "hashicorp/prod/tws-missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upgrade_state_v0() {
        let api = api();
        let resource = resource();
        let upgraded = resource
            .upgrade_state(
                &api,
                0,
                json!({"id": "tws-1", "access": "read", "team_id": "team-owners", "workspace_id": "hashicorp/prod"}),
            )
            .await
            .unwrap();
        assert_eq!(upgraded["workspace_id"], "ws-prod1");
        assert_eq!(upgraded["access"], "read");

        let err = resource
            .upgrade_state(&api, 0, json!({"workspace_id": "hashicorp/gone"}))
            .await
            .unwrap_err();
        assert!(err
            .message()
            .starts_with("Error reading configuration of workspace hashicorp/gone"));

        let current = json!({"id": "tws-1", "workspace_id": "ws-prod1"});
        assert_eq!(
            resource.upgrade_state(&api, 1, current.clone()).await.unwrap(),
            current
        );
        assert!(resource.upgrade_state(&api, 7, current).await.is_err());
    }
}
