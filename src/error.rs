//! Error types for the TFE provider.

use thiserror::Error;

/// Errors returned by [`TfeApi`](crate::client::TfeApi) implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The requested entity does not exist (or is not visible to the token).
    #[error("resource not found")]
    NotFound,

    /// The token was rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// The API rejected one of the submitted attributes.
    #[error("invalid attribute {attribute}: {message}")]
    InvalidAttribute {
        /// The attribute that was rejected.
        attribute: String,
        /// The API's explanation.
        message: String,
    },

    /// Any other failure talking to the API.
    #[error("{0}")]
    Request(String),
}

impl ApiError {
    /// Whether this is the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Errors that can occur while serving a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A call to the remote API failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Api(_err) => "API error (see Debug output)",
            Self::PermissionDenied(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Wrap an API failure with the operation and entity it concerned.
    ///
    /// Unauthorized responses become [`ProviderError::PermissionDenied`];
    /// everything else keeps the context in a [`ProviderError::Sdk`] message.
    pub fn api(context: impl std::fmt::Display, err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => Self::PermissionDenied(format!("{}: {}", context, err)),
            ApiError::InvalidAttribute { .. } => Self::Validation(format!("{}: {}", context, err)),
            _ => Self::Sdk(format!("{}: {}", context, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("tws-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: tws-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("tfe_workspace".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: tfe_workspace");
    }

    #[test]
    fn test_api_error_conversion() {
        let err: ProviderError = ApiError::NotFound.into();
        assert_eq!(format!("{}", err), "API error: resource not found");
        assert!(matches!(err, ProviderError::Api(ApiError::NotFound)));
    }

    #[test]
    fn test_api_with_context() {
        let err = ProviderError::api(
            "Error reading configuration of team access tws-1",
            ApiError::Request("connection reset".to_string()),
        );
        assert_eq!(
            err.message(),
            "Error reading configuration of team access tws-1: connection reset"
        );

        let err = ProviderError::api("Error deleting team access tws-1", ApiError::Unauthorized);
        assert!(matches!(err, ProviderError::PermissionDenied(_)));

        let err = ProviderError::api(
            "Error giving team owners write access to workspace prod",
            ApiError::InvalidAttribute {
                attribute: "runs".to_string(),
                message: "is not allowed with access write".to_string(),
            },
        );
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().contains("invalid attribute runs"));
    }

    #[test]
    fn test_not_found_sentinel() {
        assert!(ApiError::NotFound.is_not_found());
        assert!(!ApiError::Unauthorized.is_not_found());
        assert!(!ApiError::Request("boom".to_string()).is_not_found());
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(err.message(), "resource-123");

        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::InvalidRequest("bad request".to_string());
        assert_eq!(err.message(), "bad request");
    }
}
