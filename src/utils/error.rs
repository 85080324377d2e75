use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 單一目標失敗的種類，只用於日誌與分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    RequestTimedOut,
    EndpointUnavailable,
    UnexpectedResponse,
    MalformedTarget,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RequestTimedOut => "request_timed_out",
            FailureKind::EndpointUnavailable => "endpoint_unavailable",
            FailureKind::UnexpectedResponse => "unexpected_response",
            FailureKind::MalformedTarget => "malformed_target",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one failed fetch. Never surfaced to the caller of the aggregate endpoint.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {target} took too long (deadline reached after {waited:?})")]
    RequestTimedOut { target: String, waited: Duration },

    #[error("Endpoint {target} is unavailable: {source}")]
    EndpointUnavailable {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {target}: {reason}")]
    UnexpectedResponse { target: String, reason: String },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::RequestTimedOut { .. } => FailureKind::RequestTimedOut,
            FetchError::EndpointUnavailable { .. } => FailureKind::EndpointUnavailable,
            FetchError::UnexpectedResponse { .. } => FailureKind::UnexpectedResponse,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            FetchError::RequestTimedOut { target, .. }
            | FetchError::EndpointUnavailable { target, .. }
            | FetchError::UnexpectedResponse { target, .. } => target,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Target '{value}' is not an absolute http(s) URL: {reason}")]
    Malformed { value: String, reason: String },
}

impl TargetError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::MalformedTarget
    }
}

/// Errors outside the per-target failure model: configuration, startup and rendering.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to bind {addr}: {source}")]
    BindError {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    pub fn user_friendly_message(&self) -> String {
        match self {
            ServiceError::IoError(e) => format!("File or network operation failed: {}", e),
            ServiceError::SerializationError(_) => {
                "Failed to encode the response payload".to_string()
            }
            ServiceError::HttpClientError(_) => "Failed to set up the HTTP client".to_string(),
            ServiceError::ConfigError { message } => format!("Configuration problem: {}", message),
            ServiceError::ConfigValidationError { field, message } => {
                format!("Setting '{}' is invalid: {}", field, message)
            }
            ServiceError::InvalidConfigValueError { field, value, reason } => {
                format!("Setting '{}' has invalid value '{}': {}", field, value, reason)
            }
            ServiceError::BindError { addr, .. } => format!("Cannot listen on {}", addr),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ServiceError::IoError(_) => "Check that the file exists and is readable",
            ServiceError::SerializationError(_) => "This is an internal fault, please report it",
            ServiceError::HttpClientError(_) => "Check the TLS/connect settings of the client",
            ServiceError::ConfigError { .. }
            | ServiceError::ConfigValidationError { .. }
            | ServiceError::InvalidConfigValueError { .. } => {
                "Fix the configuration file or command line flags and restart"
            }
            ServiceError::BindError { .. } => {
                "Make sure the port is free or choose another --listen-addr"
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "❌ Failed to render response");
        let body = serde_json::json!({ "error": self.user_friendly_message() });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
