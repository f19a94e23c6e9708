//! Resource definitions.
//!
//! Each resource declares its schema and maps the host's lifecycle onto
//! [`TfeApi`] calls. State moves in and out of resources as JSON, but is
//! deserialized into typed records at the boundary.

use async_trait::async_trait;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::client::TfeApi;
use crate::diff::ResourceDiff;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::validation;

pub mod notification_configuration;
pub mod team_access;

pub use notification_configuration::NotificationConfigurationResource;
pub use team_access::TeamAccessResource;

/// A managed resource type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The resource type name, e.g. `tfe_team_access`.
    fn type_name(&self) -> &'static str;

    /// The current schema.
    fn schema(&self) -> Schema;

    /// Validate a resource configuration.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Adjust a planned change before it is finalized.
    fn customize_diff(&self, diff: &mut ResourceDiff<'_>) -> Result<(), ProviderError> {
        let _ = diff;
        Ok(())
    }

    /// Create the resource and return its state.
    async fn create(&self, api: &dyn TfeApi, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. Returns `Value::Null` when the resource no longer exists.
    async fn read(&self, api: &dyn TfeApi, current: Value) -> Result<Value, ProviderError>;

    /// Apply a planned update and return the new state.
    async fn update(
        &self,
        api: &dyn TfeApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the resource. Deleting something already gone succeeds.
    async fn delete(&self, api: &dyn TfeApi, current: Value) -> Result<(), ProviderError>;

    /// Build state for an existing object from an import id.
    async fn import(&self, api: &dyn TfeApi, id: &str) -> Result<Value, ProviderError>;

    /// Migrate state written by an older schema version.
    async fn upgrade_state(
        &self,
        api: &dyn TfeApi,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = api;
        let current = self.schema().version;
        if version == current {
            Ok(state)
        } else {
            Err(ProviderError::FailedPrecondition(format!(
                "{} has no state upgrade from schema version {} to {}",
                self.type_name(),
                version,
                current
            )))
        }
    }
}

/// Read state back after an import, failing if the object does not exist.
pub(crate) async fn read_imported(
    resource: &dyn Resource,
    api: &dyn TfeApi,
    id: &str,
    state: Value,
) -> Result<Value, ProviderError> {
    let state = resource.read(api, state).await?;
    if state.is_null() {
        return Err(ProviderError::NotFound(format!(
            "Cannot import non-existent remote object: {} {}",
            resource.type_name(),
            id
        )));
    }
    Ok(state)
}

/// Deserialize an optional field, treating null and `""` as unset.
pub(crate) fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Deserialize a field whose null means "empty".
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The `id` of a state object, or an error naming the resource type.
pub(crate) fn require_id(type_name: &str, id: Option<&str>) -> Result<String, ProviderError> {
    id.filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidRequest(format!("{} state has no id", type_name)))
}
