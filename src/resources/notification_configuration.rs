//! `tfe_notification_configuration`: run notifications for a workspace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{
    NotificationConfigurationCreateOptions, NotificationConfigurationUpdateOptions,
    NotificationDestinationType, NotificationTrigger, TfeApi,
};
use crate::diff::ResourceDiff;
use crate::error::{ApiError, ProviderError};
use crate::resources::{empty_as_none, null_as_default, read_imported, require_id, Resource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "tfe_notification_configuration";

const WORKSPACE_ID_ATTR: &str = "workspace_id";
const WORKSPACE_EXTERNAL_ID_ATTR: &str = "workspace_external_id";

/// Typed `tfe_notification_configuration` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfigurationState {
    /// Configuration id.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub id: Option<String>,
    /// Name.
    pub name: String,
    /// Destination kind.
    pub destination_type: NotificationDestinationType,
    /// Whether notifications are sent.
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
    /// HMAC token. Write-only: never returned by the API.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub token: Option<String>,
    /// Events that trigger delivery.
    #[serde(default, deserialize_with = "null_as_default")]
    pub triggers: Vec<NotificationTrigger>,
    /// Delivery URL.
    pub url: String,
    /// Deprecated alias of `workspace_id`.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub workspace_external_id: Option<String>,
    /// Workspace external id.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub workspace_id: Option<String>,
}

impl NotificationConfigurationState {
    fn check_token(&self) -> Result<(), ProviderError> {
        if self.token.is_some() && self.destination_type == NotificationDestinationType::Slack {
            return Err(ProviderError::Validation(format!(
                "Token cannot be set with destination_type of {}",
                self.destination_type.as_str()
            )));
        }
        Ok(())
    }

    fn sorted_triggers(&self) -> Vec<NotificationTrigger> {
        let mut triggers = self.triggers.clone();
        triggers.sort();
        triggers.dedup();
        triggers
    }
}

/// The `tfe_notification_configuration` resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationConfigurationResource;

impl NotificationConfigurationResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resource for NotificationConfigurationResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Sends run notifications from a workspace to a webhook or Slack.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "destination_type",
                Attribute::required_string()
                    .with_force_new()
                    .with_allowed_values(NotificationDestinationType::ALL),
            )
            .with_attribute(
                "enabled",
                Attribute::optional_bool().with_default(Value::Bool(false)),
            )
            .with_attribute("token", Attribute::optional_string().sensitive())
            .with_attribute(
                "triggers",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_allowed_values(NotificationTrigger::ALL),
            )
            .with_attribute("url", Attribute::required_string())
            .with_attribute(
                WORKSPACE_EXTERNAL_ID_ATTR,
                Attribute::optional_computed_string()
                    .with_conflicts_with(WORKSPACE_ID_ATTR)
                    .with_deprecation(
                        "Use workspace_id instead. The workspace_external_id attribute will be removed in the future.",
                    ),
            )
            .with_attribute(
                WORKSPACE_ID_ATTR,
                Attribute::optional_computed_string()
                    .with_conflicts_with(WORKSPACE_EXTERNAL_ID_ATTR),
            )
    }

    fn customize_diff(&self, diff: &mut ResourceDiff<'_>) -> Result<(), ProviderError> {
        if diff.is_delete() {
            return Ok(());
        }
        // Moving between the two attributes (one side empty) is not a new workspace.
        let both_set = |old: &Value, new: &Value| {
            let set = |v: &Value| v.as_str().is_some_and(|s| !s.is_empty());
            set(old) && set(new)
        };
        diff.force_new_if_change(WORKSPACE_EXTERNAL_ID_ATTR, both_set);
        diff.force_new_if_change(WORKSPACE_ID_ATTR, both_set);
        Ok(())
    }

    async fn create(&self, api: &dyn TfeApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: NotificationConfigurationState = serde_json::from_value(planned)?;

        let workspace_id = state
            .workspace_external_id
            .clone()
            .or_else(|| state.workspace_id.clone())
            .ok_or_else(|| {
                ProviderError::Validation(
                    "One of workspace_id or workspace_external_id must be set".to_string(),
                )
            })?;
        state.check_token()?;

        let options = NotificationConfigurationCreateOptions {
            destination_type: state.destination_type,
            enabled: state.enabled,
            name: state.name.clone(),
            token: state.token.clone(),
            triggers: state.sorted_triggers(),
            url: state.url.clone(),
        };

        debug!(name = %state.name, workspace_id = %workspace_id, "Creating notification configuration");
        let created = api
            .create_notification_configuration(&workspace_id, options)
            .await
            .map_err(|e| {
                ProviderError::api(
                    format!("Error creating notification configuration {}", state.name),
                    e,
                )
            })?;
        info!(id = %created.id, name = %created.name, "Created notification configuration");

        state.id = Some(created.id);
        self.read(api, serde_json::to_value(&state)?).await
    }

    async fn read(&self, api: &dyn TfeApi, current: Value) -> Result<Value, ProviderError> {
        let id = require_id(TYPE_NAME, current.get("id").and_then(Value::as_str))?;
        let token = current
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        debug!(id = %id, "Reading notification configuration");
        let remote = match api.read_notification_configuration(&id).await {
            Ok(remote) => remote,
            Err(ApiError::NotFound) => {
                debug!(id = %id, "Notification configuration no longer exists");
                return Ok(Value::Null);
            },
            Err(e) => {
                return Err(ProviderError::api(
                    format!("Error reading notification configuration {}", id),
                    e,
                ))
            },
        };

        let mut state = NotificationConfigurationState {
            id: Some(remote.id),
            name: remote.name,
            destination_type: remote.destination_type,
            enabled: remote.enabled,
            token,
            triggers: remote.triggers,
            url: remote.url,
            workspace_external_id: Some(remote.workspace_id.clone()),
            workspace_id: Some(remote.workspace_id),
        };
        state.triggers = state.sorted_triggers();
        Ok(serde_json::to_value(&state)?)
    }

    async fn update(
        &self,
        api: &dyn TfeApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let mut state: NotificationConfigurationState = serde_json::from_value(planned)?;
        let id = require_id(
            TYPE_NAME,
            state
                .id
                .as_deref()
                .or_else(|| prior.get("id").and_then(Value::as_str)),
        )?;
        state.check_token()?;

        let options = NotificationConfigurationUpdateOptions {
            enabled: state.enabled,
            name: state.name.clone(),
            token: state.token.clone(),
            triggers: state.sorted_triggers(),
            url: state.url.clone(),
        };

        debug!(id = %id, "Updating notification configuration");
        api.update_notification_configuration(&id, options)
            .await
            .map_err(|e| {
                ProviderError::api(format!("Error updating notification configuration {}", id), e)
            })?;

        state.id = Some(id);
        self.read(api, serde_json::to_value(&state)?).await
    }

    async fn delete(&self, api: &dyn TfeApi, current: Value) -> Result<(), ProviderError> {
        let id = require_id(TYPE_NAME, current.get("id").and_then(Value::as_str))?;

        debug!(id = %id, "Deleting notification configuration");
        match api.delete_notification_configuration(&id).await {
            Ok(()) | Err(ApiError::NotFound) => Ok(()),
            Err(e) => Err(ProviderError::api(
                format!("Error deleting notification configuration {}", id),
                e,
            )),
        }
    }

    async fn import(&self, api: &dyn TfeApi, id: &str) -> Result<Value, ProviderError> {
        read_imported(self, api, id, serde_json::json!({ "id": id })).await
    }
}
