//! The Terraform Enterprise/Cloud provider.
//!
//! [`TfeProvider`] owns the resource registry and the API handle, and maps
//! each [`ProviderService`] operation onto the matching [`Resource`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::TfeApi;
use crate::config::{ProviderConfig, ProviderOptions};
use crate::diff::ResourceDiff;
use crate::error::ProviderError;
use crate::resources::{NotificationConfigurationResource, Resource, TeamAccessResource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation;

/// Serves `tfe_*` resources against a [`TfeApi`].
pub struct TfeProvider {
    api: Arc<dyn TfeApi>,
    resources: HashMap<&'static str, Box<dyn Resource>>,
    config: RwLock<Option<ProviderConfig>>,
}

impl TfeProvider {
    /// Create a provider with default options.
    pub fn new(api: Arc<dyn TfeApi>) -> Self {
        Self::with_options(api, ProviderOptions::default())
    }

    /// Create a provider with explicit options.
    pub fn with_options(api: Arc<dyn TfeApi>, options: ProviderOptions) -> Self {
        let resources: Vec<Box<dyn Resource>> = vec![
            Box::new(TeamAccessResource::new(options.workspace_id_pattern)),
            Box::new(NotificationConfigurationResource::new()),
        ];
        Self {
            api,
            resources: resources
                .into_iter()
                .map(|resource| (resource.type_name(), resource))
                .collect(),
            config: RwLock::new(None),
        }
    }

    /// The active configuration, once `configure` has succeeded.
    pub async fn config(&self) -> Option<ProviderConfig> {
        self.config.read().await.clone()
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|resource| resource.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    /// Look up a resource and make sure the provider is ready to call the API.
    async fn configured_resource(
        &self,
        resource_type: &str,
    ) -> Result<&dyn Resource, ProviderError> {
        let resource = self.resource(resource_type)?;
        if self.config.read().await.is_none() {
            return Err(ProviderError::Configuration(
                "provider has not been configured".to_string(),
            ));
        }
        Ok(resource)
    }

    /// Schema and semantic diagnostics for a provider block, plus the parsed
    /// configuration when the block is well-formed.
    fn config_diagnostics(
        config: &Value,
    ) -> Result<(Vec<Diagnostic>, Option<ProviderConfig>), ProviderError> {
        let mut diagnostics = validation::validate(&ProviderConfig::schema(), config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok((diagnostics, None));
        }
        let parsed = ProviderConfig::from_value(config.clone())?.with_env_fallbacks();
        diagnostics.extend(parsed.validate());
        Ok((diagnostics, Some(parsed)))
    }
}

#[async_trait::async_trait]
impl ProviderService for TfeProvider {
    fn schema(&self) -> ProviderSchema {
        self.resources.iter().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, (name, resource)| schema.with_resource(*name, resource.schema()),
        )
    }

    #[instrument(skip(self, config))]
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let (diagnostics, _) = Self::config_diagnostics(&config)?;
        debug!(diagnostics = diagnostics.len(), "Provider config validated");
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let (diagnostics, parsed) = Self::config_diagnostics(&config)?;
        let parsed = match parsed {
            Some(parsed) if !diagnostics.iter().any(Diagnostic::is_error) => parsed,
            _ => {
                warn!(diagnostics = diagnostics.len(), "Provider configuration rejected");
                return Ok(diagnostics);
            },
        };

        info!(
            hostname = %parsed.hostname(),
            ssl_skip_verify = parsed.ssl_skip_verify(),
            "Provider configured"
        );
        *self.config.write().await = Some(parsed);
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Provider stopping");
        Ok(())
    }

    #[instrument(skip(self, config))]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.resource(resource_type)?.validate(&config);
        debug!(
            resource_type = %resource_type,
            diagnostics = diagnostics.len(),
            "Resource config validated"
        );
        Ok(diagnostics)
    }

    #[instrument(skip(self, state))]
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.configured_resource(resource_type).await?;
        resource
            .upgrade_state(self.api.as_ref(), version, state)
            .await
            .inspect_err(|e| {
                error!(resource_type = %resource_type, version, error = %e, "State upgrade failed")
            })
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.configured_resource(resource_type).await?;
        let schema = resource.schema();
        let mut diff = ResourceDiff::new(&schema, prior_state, proposed_state);
        debug!(resource_type = %resource_type, is_create = diff.is_create(), "Plan called");

        if !diff.is_delete() {
            if diff.is_create() {
                diff.set_new_computed("id")?;
            }
            resource.customize_diff(&mut diff)?;
        }

        let result = diff.into_plan();
        info!(
            resource_type = %resource_type,
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.configured_resource(resource_type).await?;
        info!(resource_type = %resource_type, "Create called");
        match resource.create(self.api.as_ref(), planned_state).await {
            Ok(state) => {
                info!(resource_type = %resource_type, "Create completed successfully");
                Ok(state)
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Create failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.configured_resource(resource_type).await?;
        let state = resource
            .read(self.api.as_ref(), current_state)
            .await
            .inspect_err(|e| error!(resource_type = %resource_type, error = %e, "Read failed"))?;
        if state.is_null() {
            warn!(resource_type = %resource_type, "Resource no longer exists, removing from state");
        }
        Ok(state)
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.configured_resource(resource_type).await?;
        info!(resource_type = %resource_type, "Update called");
        resource
            .update(self.api.as_ref(), prior_state, planned_state)
            .await
            .inspect_err(|e| error!(resource_type = %resource_type, error = %e, "Update failed"))
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.configured_resource(resource_type).await?;
        info!(resource_type = %resource_type, "Delete called");
        resource
            .delete(self.api.as_ref(), current_state)
            .await
            .inspect_err(|e| error!(resource_type = %resource_type, error = %e, "Delete failed"))
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.configured_resource(resource_type).await?;
        info!(resource_type = %resource_type, id = %id, "Import called");
        let state = resource
            .import(self.api.as_ref(), id)
            .await
            .inspect_err(|e| error!(resource_type = %resource_type, error = %e, "Import failed"))?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }
}
