//! Test harness for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way a host would,
//! and [`MemoryApi`] stands in for Terraform Enterprise/Cloud so resources
//! can be exercised end to end without a network.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tfe_provider::testing::{MemoryApi, ProviderTester};
//! use tfe_provider::TfeProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_grant_read_access() {
//!     let api = Arc::new(
//!         MemoryApi::new()
//!             .with_workspace("ws-prod1", "hashicorp", "prod")
//!             .with_team("team-owners", "owners"),
//!     );
//!     let tester = ProviderTester::new(TfeProvider::new(api));
//!     tester.configure(json!({"token": "test"})).await.unwrap();
//!
//!     let state = tester.lifecycle_create("tfe_team_access", json!({
//!         "team_id": "team-owners",
//!         "workspace_id": "ws-prod1",
//!         "access": "read"
//!     })).await.unwrap();
//!
//!     assert_eq!(state["permissions"]["runs"], "read");
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::access::{AccessLevel, WorkspacePermissions};
use crate::client::{
    NotificationConfiguration, NotificationConfigurationCreateOptions,
    NotificationConfigurationUpdateOptions, TeamAccess, TeamAccessAddOptions,
    TeamAccessUpdateOptions, Team, TfeApi, Workspace,
};
use crate::error::{ApiError, ProviderError};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider through host-style calls.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the sorted list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration, failing on error diagnostics.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider, failing on error diagnostics.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration, failing on error diagnostics.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade resource state from an older schema version.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then read back. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update, then read back. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Plan a delete, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed outright.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan has at least one change.
///
/// # Panics
///
/// Panics if the plan has no changes.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires replacement.
///
/// # Panics
///
/// Panics if the plan updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan changes a top-level attribute.
///
/// # Panics
///
/// Panics if `path` is not among the plan's changes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.change(path).is_some(),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan leaves an attribute to be computed during apply.
///
/// # Panics
///
/// Panics if `path` is known at plan time.
pub fn assert_plan_computes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.is_unknown(path),
        "Expected '{}' to be computed during apply. Unknown attributes: {:?}",
        path,
        plan.unknown
    );
}

/// Assert that diagnostics contain an error whose summary contains `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .map(|d| &d.summary)
        .collect();
    assert!(
        errors.iter().any(|summary| summary.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        errors
    );
}

// =========================================================================
// In-memory API
// =========================================================================

#[derive(Default)]
struct MemoryState {
    workspaces: BTreeMap<String, Workspace>,
    teams: HashMap<String, Team>,
    team_access: BTreeMap<String, TeamAccess>,
    notifications: BTreeMap<String, NotificationConfiguration>,
    tokens: HashMap<String, String>,
    next_id: u64,
    fail_next: Option<ApiError>,
    last_add: Option<TeamAccessAddOptions>,
    last_update: Option<TeamAccessUpdateOptions>,
}

impl MemoryState {
    fn check_failure(&mut self) -> Result<(), ApiError> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// An in-memory [`TfeApi`] with the API's observable rules: unknown ids
/// are [`ApiError::NotFound`], fixed access levels fill in every
/// permission, and explicit permissions require `custom` access.
#[derive(Default)]
pub struct MemoryApi {
    state: Mutex<MemoryState>,
}

impl MemoryApi {
    /// An empty API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a workspace.
    pub fn with_workspace(mut self, id: &str, organization: &str, name: &str) -> Self {
        self.state.get_mut().workspaces.insert(
            id.to_string(),
            Workspace {
                id: id.to_string(),
                name: name.to_string(),
                organization: organization.to_string(),
            },
        );
        self
    }

    /// Seed a team.
    pub fn with_team(mut self, id: &str, name: &str) -> Self {
        self.state.get_mut().teams.insert(
            id.to_string(),
            Team {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
        self
    }

    /// Make the next API call fail with `err`.
    pub async fn fail_next(&self, err: ApiError) {
        self.state.lock().await.fail_next = Some(err);
    }

    /// A stored team access grant.
    pub async fn team_access(&self, id: &str) -> Option<TeamAccess> {
        self.state.lock().await.team_access.get(id).cloned()
    }

    /// A stored notification configuration.
    pub async fn notification_configuration(&self, id: &str) -> Option<NotificationConfiguration> {
        self.state.lock().await.notifications.get(id).cloned()
    }

    /// The options of the most recent successful grant.
    pub async fn last_team_access_add(&self) -> Option<TeamAccessAddOptions> {
        self.state.lock().await.last_add.clone()
    }

    /// The options of the most recent successful grant update.
    pub async fn last_team_access_update(&self) -> Option<TeamAccessUpdateOptions> {
        self.state.lock().await.last_update.clone()
    }
}

fn custom_only(access: AccessLevel) -> ApiError {
    ApiError::InvalidAttribute {
        attribute: "permissions".to_string(),
        message: format!("permissions cannot be set with {} access", access),
    }
}

#[async_trait]
impl TfeApi for MemoryApi {
    async fn read_workspace(&self, organization: &str, name: &str) -> Result<Workspace, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        state
            .workspaces
            .values()
            .find(|ws| ws.organization == organization && ws.name == name)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn read_workspace_by_id(&self, workspace_id: &str) -> Result<Workspace, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        state
            .workspaces
            .get(workspace_id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn read_team(&self, team_id: &str) -> Result<Team, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        state.teams.get(team_id).cloned().ok_or(ApiError::NotFound)
    }

    async fn add_team_access(&self, options: TeamAccessAddOptions) -> Result<TeamAccess, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        if !state.workspaces.contains_key(&options.workspace_id)
            || !state.teams.contains_key(&options.team_id)
        {
            return Err(ApiError::NotFound);
        }
        if !options.access.is_custom() && !options.permissions.is_empty() {
            return Err(custom_only(options.access));
        }

        let grant = TeamAccess {
            id: state.next_id("tws"),
            access: options.access,
            permissions: WorkspacePermissions::for_access(options.access)
                .merged(&options.permissions),
            team_id: Some(options.team_id.clone()),
            workspace_id: options.workspace_id.clone(),
        };
        state.team_access.insert(grant.id.clone(), grant.clone());
        state.last_add = Some(options);
        Ok(grant)
    }

    async fn read_team_access(&self, id: &str) -> Result<TeamAccess, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        state.team_access.get(id).cloned().ok_or(ApiError::NotFound)
    }

    async fn update_team_access(
        &self,
        id: &str,
        options: TeamAccessUpdateOptions,
    ) -> Result<TeamAccess, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        let grant = state.team_access.get_mut(id).ok_or(ApiError::NotFound)?;

        let access = options.access.unwrap_or(grant.access);
        if !access.is_custom() && !options.permissions.is_empty() {
            return Err(custom_only(access));
        }
        grant.permissions = if access.is_custom() {
            grant.permissions.merged(&options.permissions)
        } else {
            WorkspacePermissions::for_access(access)
        };
        grant.access = access;

        let grant = grant.clone();
        state.last_update = Some(options);
        Ok(grant)
    }

    async fn remove_team_access(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        state
            .team_access
            .remove(id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }

    async fn create_notification_configuration(
        &self,
        workspace_id: &str,
        options: NotificationConfigurationCreateOptions,
    ) -> Result<NotificationConfiguration, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        if !state.workspaces.contains_key(workspace_id) {
            return Err(ApiError::NotFound);
        }

        let config = NotificationConfiguration {
            id: state.next_id("nc"),
            name: options.name,
            destination_type: options.destination_type,
            enabled: options.enabled,
            triggers: options.triggers,
            url: options.url,
            workspace_id: workspace_id.to_string(),
        };
        if let Some(token) = options.token {
            state.tokens.insert(config.id.clone(), token);
        }
        state.notifications.insert(config.id.clone(), config.clone());
        Ok(config)
    }

    async fn read_notification_configuration(
        &self,
        id: &str,
    ) -> Result<NotificationConfiguration, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        state.notifications.get(id).cloned().ok_or(ApiError::NotFound)
    }

    async fn update_notification_configuration(
        &self,
        id: &str,
        options: NotificationConfigurationUpdateOptions,
    ) -> Result<NotificationConfiguration, ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        let config = state.notifications.get_mut(id).ok_or(ApiError::NotFound)?;
        config.enabled = options.enabled;
        config.name = options.name;
        config.triggers = options.triggers;
        config.url = options.url;
        let config = config.clone();

        match options.token {
            Some(token) => state.tokens.insert(id.to_string(), token),
            None => state.tokens.remove(id),
        };
        Ok(config)
    }

    async fn delete_notification_configuration(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        state.tokens.remove(id);
        state
            .notifications
            .remove(id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}
