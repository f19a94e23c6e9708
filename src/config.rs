//! Provider configuration.
//!
//! [`ProviderConfig`] is what the user writes in the `provider` block and
//! arrives through `configure`. [`ProviderOptions`] are fixed when the
//! provider is constructed.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Hostname used when none is configured.
pub const DEFAULT_HOSTNAME: &str = "app.terraform.io";

/// Workspace external ids look like `ws-3K3NnOn1sqXx5Q9u`.
pub const DEFAULT_WORKSPACE_ID_PATTERN: &str = r"^ws-[a-zA-Z0-9]+$";

/// Environment variable consulted for `hostname`.
pub const HOSTNAME_ENV: &str = "TFE_HOSTNAME";
/// Environment variable consulted for `token`.
pub const TOKEN_ENV: &str = "TFE_TOKEN";
/// Environment variable consulted for `ssl_skip_verify`.
pub const SSL_SKIP_VERIFY_ENV: &str = "TFE_SSL_SKIP_VERIFY";

/// The `provider` block.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The API hostname, without scheme.
    #[serde(default)]
    pub hostname: Option<String>,
    /// The API token.
    #[serde(default)]
    pub token: Option<String>,
    /// Whether to skip TLS verification.
    #[serde(default)]
    pub ssl_skip_verify: Option<bool>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("hostname", &self.hostname)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("ssl_skip_verify", &self.ssl_skip_verify)
            .finish()
    }
}

impl ProviderConfig {
    /// Schema for the `provider` block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Terraform Enterprise/Cloud connection settings")
            .with_attribute(
                "hostname",
                Attribute::optional_string().with_description(format!(
                    "The API hostname. Defaults to {}, or ${}.",
                    DEFAULT_HOSTNAME, HOSTNAME_ENV
                )),
            )
            .with_attribute(
                "token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!("The API token. Defaults to ${}.", TOKEN_ENV)),
            )
            .with_attribute(
                "ssl_skip_verify",
                Attribute::optional_bool().with_description(format!(
                    "Skip TLS verification. Defaults to ${}, then false.",
                    SSL_SKIP_VERIFY_ENV
                )),
            )
    }

    /// Deserialize the provider block. Null means "nothing configured".
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Fill unset fields from `lookup` (an environment accessor).
    pub fn with_fallbacks<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if self.hostname.as_deref().map_or(true, str::is_empty) {
            self.hostname = non_empty(HOSTNAME_ENV);
        }
        if self.token.as_deref().map_or(true, str::is_empty) {
            self.token = non_empty(TOKEN_ENV);
        }
        if self.ssl_skip_verify.is_none() {
            self.ssl_skip_verify = non_empty(SSL_SKIP_VERIFY_ENV)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true"));
        }
        self
    }

    /// Fill unset fields from the process environment.
    pub fn with_env_fallbacks(self) -> Self {
        self.with_fallbacks(|name| std::env::var(name).ok())
    }

    /// The effective hostname.
    pub fn hostname(&self) -> &str {
        self.hostname
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOSTNAME)
    }

    /// The effective TLS setting.
    pub fn ssl_skip_verify(&self) -> bool {
        self.ssl_skip_verify.unwrap_or(false)
    }

    /// Check the configuration, returning errors and warnings.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let hostname = self.hostname();
        if hostname.contains("://") || hostname.contains('/') {
            diagnostics.push(
                Diagnostic::error("Invalid hostname")
                    .with_detail(format!(
                        "hostname must be a bare host name such as {}, got {}",
                        DEFAULT_HOSTNAME, hostname
                    ))
                    .with_attribute("hostname"),
            );
        }
        if self.token.as_deref().map_or(true, str::is_empty) {
            diagnostics.push(
                Diagnostic::warning("No API token configured")
                    .with_detail(format!(
                        "Set token in the provider block or ${}; requests will be unauthenticated",
                        TOKEN_ENV
                    ))
                    .with_attribute("token"),
            );
        }
        if self.ssl_skip_verify() {
            diagnostics.push(
                Diagnostic::warning("TLS verification disabled").with_attribute("ssl_skip_verify"),
            );
        }
        diagnostics
    }
}

/// Settings fixed at construction time.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Pattern a workspace external id must match.
    pub workspace_id_pattern: Regex,
}

impl ProviderOptions {
    /// Options with the default workspace id pattern.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different workspace id pattern.
    pub fn with_workspace_id_pattern(mut self, pattern: &str) -> Result<Self, ProviderError> {
        self.workspace_id_pattern = Regex::new(pattern).map_err(|e| {
            ProviderError::Configuration(format!("invalid workspace id pattern: {}", e))
        })?;
        Ok(self)
    }
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            // Constant pattern, covered by test_workspace_id_pattern.
            workspace_id_pattern: Regex::new(DEFAULT_WORKSPACE_ID_PATTERN)
                .expect("default workspace id pattern is valid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value(json!(null)).unwrap();
        assert_eq!(config.hostname(), DEFAULT_HOSTNAME);
        assert!(!config.ssl_skip_verify());
    }

    #[test]
    fn test_from_value() {
        let config = ProviderConfig::from_value(json!({
            "hostname": "tfe.example.com",
            "token": "secret",
            "ssl_skip_verify": true
        }))
        .unwrap();
        assert_eq!(config.hostname(), "tfe.example.com");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert!(config.ssl_skip_verify());

        assert!(ProviderConfig::from_value(json!({"hostname": 42})).is_err());
    }

    #[test]
    fn test_env_fallbacks() {
        let config = ProviderConfig::from_value(json!({"hostname": ""}))
            .unwrap()
            .with_fallbacks(env(&[
                (HOSTNAME_ENV, "tfe.internal"),
                (TOKEN_ENV, "from-env"),
                (SSL_SKIP_VERIFY_ENV, "TRUE"),
            ]));
        assert_eq!(config.hostname(), "tfe.internal");
        assert_eq!(config.token.as_deref(), Some("from-env"));
        assert!(config.ssl_skip_verify());

        // Explicit configuration wins.
        let config = ProviderConfig::from_value(json!({"token": "explicit", "ssl_skip_verify": false}))
            .unwrap()
            .with_fallbacks(env(&[(TOKEN_ENV, "from-env"), (SSL_SKIP_VERIFY_ENV, "1")]));
        assert_eq!(config.token.as_deref(), Some("explicit"));
        assert!(!config.ssl_skip_verify());
    }

    #[test]
    fn test_validate() {
        let config = ProviderConfig {
            hostname: Some("https://tfe.example.com".to_string()),
            token: Some("t".to_string()),
            ssl_skip_verify: None,
        };
        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());

        let diagnostics = ProviderConfig::default().validate();
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("token"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig {
            token: Some("super-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_workspace_id_pattern() {
        let options = ProviderOptions::new();
        assert!(options.workspace_id_pattern.is_match("ws-3K3NnOn1sqXx5Q9u"));
        assert!(!options.workspace_id_pattern.is_match("my-org/my-workspace"));

        let options = ProviderOptions::new()
            .with_workspace_id_pattern(r"^[a-z0-9-]+/[a-z0-9-]+$")
            .unwrap();
        assert!(options.workspace_id_pattern.is_match("my-org/my-workspace"));

        let err = ProviderOptions::new()
            .with_workspace_id_pattern("^ws-[")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.message().starts_with("invalid workspace id pattern"));
    }
}
