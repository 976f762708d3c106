//! Error types for provisioning operations.
//!
//! This module provides the error type shared by every provisioning crate, the mapping from
//! Azure Resource Manager HTTP responses onto it, and structured error responses.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ResourceRef;

/// Main error type for provisioning operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Credential exchange failed or the session was rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Referenced resource, subnet or catalog entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider rejected the request (quota, name collision, invalid CIDR nesting, ...)
    #[error("Provider rejected request: {code}: {message}")]
    Provider {
        /// Provider error code
        code: String,
        /// Provider error message
        message: String,
    },

    /// Bounded wait on a long-running operation elapsed
    #[error("Timeout waiting for operation: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Provider is temporarily unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Failed to parse a provider response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// An error raised while operating on a specific resource
    #[error("{resource}: {source}")]
    Resource {
        /// The resource the failing operation targeted
        resource: ResourceRef,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },
}

/// Specialized result type for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Resource the error relates to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Error envelope returned by Azure Resource Manager.
#[derive(Debug, Clone, Deserialize)]
struct ArmErrorEnvelope {
    error: ArmError,
}

/// Error body within an ARM envelope or an async operation status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmError {
    /// Provider error code
    #[serde(default)]
    pub code: String,
    /// Provider error message
    #[serde(default)]
    pub message: String,
}

impl From<ArmError> for Error {
    fn from(err: ArmError) -> Self {
        Self::Provider {
            code: err.code,
            message: err.message,
        }
    }
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Provider { .. } => "PROVIDER_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::Resource { source, .. } => source.error_code(),
        }
    }

    /// Attach the resource an operation was targeting.
    ///
    /// An error that already carries a resource keeps its innermost context.
    #[must_use]
    pub fn for_resource(self, resource: ResourceRef) -> Self {
        match self {
            err @ Self::Resource { .. } => err,
            err => Self::Resource {
                resource,
                source: Box::new(err),
            },
        }
    }

    /// The resource context, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            Self::Resource { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// The error with any resource context stripped.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Resource { source, .. } => source.root_cause(),
            err => err,
        }
    }

    /// Returns true if the referenced thing does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), Self::NotFound(_))
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.root_cause().to_string(),
            },
            resource: self.resource().cloned(),
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub fn should_log(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::ConfigError(_) | Self::Authentication(_) | Self::ServiceUnavailable(_)
        )
    }
}

/// Map a non-success Resource Manager response onto an [`Error`].
///
/// `service` names the calling client for messages; `text` is the raw response body.
#[must_use]
pub fn map_status_to_error(service: &str, status: StatusCode, text: &str) -> Error {
    let provider = serde_json::from_str::<ArmErrorEnvelope>(text)
        .ok()
        .map(|envelope| envelope.error);

    match status {
        StatusCode::NOT_FOUND => Error::NotFound(
            provider.map_or_else(|| text.to_string(), |err| format!("{}: {}", err.code, err.message)),
        ),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Authentication(format!("{service} rejected credentials: {text}"))
        }
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("{service} temporarily unavailable: {text}"))
        }
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("{service} server error {status}: {text}"))
        }
        status if status.is_client_error() => provider.map_or_else(
            || Error::Provider {
                code: status.as_u16().to_string(),
                message: text.to_string(),
            },
            Error::from,
        ),
        _ => Error::HttpError(format!("{service} error {status}: {text}")),
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::ValidationError(err.to_string())
    }
}
