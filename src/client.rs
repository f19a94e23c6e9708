//! The remote API seam.
//!
//! Resources talk to Terraform Enterprise/Cloud only through [`TfeApi`].
//! Transport, authentication, and retries belong to the implementation;
//! resources only rely on [`ApiError::NotFound`] being distinguishable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::access::{AccessLevel, PermissionSet, WorkspacePermissions};
use crate::error::ApiError;

/// A workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// External id (`ws-...`).
    pub id: String,
    /// Human-readable name, unique within the organization.
    pub name: String,
    /// Owning organization name.
    pub organization: String,
}

/// A team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team id (`team-...`).
    pub id: String,
    /// Team name.
    pub name: String,
}

/// A team's access grant on a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAccess {
    /// Grant id (`tws-...`).
    pub id: String,
    /// Access level.
    pub access: AccessLevel,
    /// Resolved permissions.
    pub permissions: WorkspacePermissions,
    /// The team, if still present.
    pub team_id: Option<String>,
    /// The workspace external id.
    pub workspace_id: String,
}

/// Options for granting a team access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamAccessAddOptions {
    /// Access level; `custom` makes `permissions` authoritative.
    pub access: AccessLevel,
    /// Explicit permissions. Unset fields are left to the API.
    pub permissions: PermissionSet,
    /// Team id.
    pub team_id: String,
    /// Workspace external id.
    pub workspace_id: String,
}

/// Options for changing a team access grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamAccessUpdateOptions {
    /// New access level, if any.
    pub access: Option<AccessLevel>,
    /// Permissions to change. Unset fields are left as they are.
    pub permissions: PermissionSet,
}

/// Where notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationDestinationType {
    /// Signed JSON webhook.
    Generic,
    /// Slack incoming webhook.
    Slack,
}

impl NotificationDestinationType {
    /// Every accepted value.
    pub const ALL: [&'static str; 2] = ["generic", "slack"];

    /// The API's name for this destination.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Slack => "slack",
        }
    }
}

/// Run events that trigger a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NotificationTrigger {
    /// A run was created.
    #[serde(rename = "run:created")]
    Created,
    /// A run started planning.
    #[serde(rename = "run:planning")]
    Planning,
    /// A run needs confirmation.
    #[serde(rename = "run:needs_attention")]
    NeedsAttention,
    /// A run started applying.
    #[serde(rename = "run:applying")]
    Applying,
    /// A run finished.
    #[serde(rename = "run:completed")]
    Completed,
    /// A run failed.
    #[serde(rename = "run:errored")]
    Errored,
}

impl NotificationTrigger {
    /// Every accepted value.
    pub const ALL: [&'static str; 6] = [
        "run:created",
        "run:planning",
        "run:needs_attention",
        "run:applying",
        "run:completed",
        "run:errored",
    ];
}

/// A notification configuration on a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfiguration {
    /// Configuration id (`nc-...`).
    pub id: String,
    /// Name.
    pub name: String,
    /// Destination kind.
    pub destination_type: NotificationDestinationType,
    /// Whether notifications are sent.
    pub enabled: bool,
    /// Events that trigger delivery.
    pub triggers: Vec<NotificationTrigger>,
    /// Delivery URL.
    pub url: String,
    /// External id of the workspace it is attached to.
    pub workspace_id: String,
}

/// Options for creating a notification configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct NotificationConfigurationCreateOptions {
    /// Destination kind.
    pub destination_type: NotificationDestinationType,
    /// Whether notifications are sent.
    pub enabled: bool,
    /// Name.
    pub name: String,
    /// HMAC token for generic destinations.
    pub token: Option<String>,
    /// Events that trigger delivery.
    pub triggers: Vec<NotificationTrigger>,
    /// Delivery URL.
    pub url: String,
}

/// Options for updating a notification configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct NotificationConfigurationUpdateOptions {
    /// Whether notifications are sent.
    pub enabled: bool,
    /// Name.
    pub name: String,
    /// HMAC token for generic destinations.
    pub token: Option<String>,
    /// Events that trigger delivery.
    pub triggers: Vec<NotificationTrigger>,
    /// Delivery URL.
    pub url: String,
}

macro_rules! redacted_debug {
    ($ty:ident { $($field:ident),* }) => {
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))*
                    .field("token", &self.token.as_ref().map(|_| "<redacted>"))
                    .finish()
            }
        }
    };
}

redacted_debug!(NotificationConfigurationCreateOptions {
    destination_type,
    enabled,
    name,
    triggers,
    url
});
redacted_debug!(NotificationConfigurationUpdateOptions {
    enabled,
    name,
    triggers,
    url
});

/// Operations the provider needs from the Terraform Enterprise/Cloud API.
#[async_trait]
pub trait TfeApi: Send + Sync {
    // ========================================================================
    // Workspaces & Teams
    // ========================================================================

    /// Read a workspace by organization and name.
    async fn read_workspace(&self, organization: &str, name: &str)
        -> Result<Workspace, ApiError>;

    /// Read a workspace by external id.
    async fn read_workspace_by_id(&self, workspace_id: &str) -> Result<Workspace, ApiError>;

    /// Read a team.
    async fn read_team(&self, team_id: &str) -> Result<Team, ApiError>;

    // ========================================================================
    // Team Access
    // ========================================================================

    /// Grant a team access to a workspace.
    async fn add_team_access(&self, options: TeamAccessAddOptions)
        -> Result<TeamAccess, ApiError>;

    /// Read a team access grant.
    async fn read_team_access(&self, id: &str) -> Result<TeamAccess, ApiError>;

    /// Change a team access grant.
    async fn update_team_access(
        &self,
        id: &str,
        options: TeamAccessUpdateOptions,
    ) -> Result<TeamAccess, ApiError>;

    /// Revoke a team access grant.
    async fn remove_team_access(&self, id: &str) -> Result<(), ApiError>;

    // ========================================================================
    // Notification Configurations
    // ========================================================================

    /// Create a notification configuration on a workspace.
    async fn create_notification_configuration(
        &self,
        workspace_id: &str,
        options: NotificationConfigurationCreateOptions,
    ) -> Result<NotificationConfiguration, ApiError>;

    /// Read a notification configuration.
    async fn read_notification_configuration(
        &self,
        id: &str,
    ) -> Result<NotificationConfiguration, ApiError>;

    /// Update a notification configuration.
    async fn update_notification_configuration(
        &self,
        id: &str,
        options: NotificationConfigurationUpdateOptions,
    ) -> Result<NotificationConfiguration, ApiError>;

    /// Delete a notification configuration.
    async fn delete_notification_configuration(&self, id: &str) -> Result<(), ApiError>;
}

/// Resolve `<organization>/<workspace>` to the workspace's external id.
pub async fn fetch_workspace_external_id(
    api: &dyn TfeApi,
    human_id: &str,
) -> Result<String, ApiError> {
    let (organization, name) = human_id
        .split_once('/')
        .filter(|(org, name)| !org.is_empty() && !name.is_empty())
        .ok_or_else(|| {
            ApiError::Request(format!(
                "invalid workspace ID format: {} (expected <ORGANIZATION>/<WORKSPACE>)",
                human_id
            ))
        })?;
    let workspace = api.read_workspace(organization, name).await?;
    Ok(workspace.id)
}
