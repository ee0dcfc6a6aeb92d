//! Error types for the proxy.
//!
//! Every request-path failure is a [`ProxyError`]; the [`IntoResponse`] impl is
//! the single place where failures become JSON error bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{message}")]
    Validation {
        message: String,
        usage: Option<String>,
    },

    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Upstream returned status {status}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Upstream request failed: {0}")]
    Network(String),

    #[error("Upstream timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            usage: None,
        }
    }

    pub fn validation_with_usage(msg: impl Into<String>, usage: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            usage: Some(usage.into()),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to the caller.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Validation { message, usage } => ErrorBody {
                error: message.clone(),
                details: None,
                usage: usage.clone(),
            },
            Self::InvalidBody(details) => ErrorBody::new("Invalid JSON body").with_details(details),
            Self::MethodNotAllowed => ErrorBody::new("Method not allowed"),
            Self::UpstreamStatus { body, .. } => {
                ErrorBody::new("Upstream Error").with_details(body)
            }
            Self::Timeout(_) => ErrorBody::new("Upstream timed out").with_details(self.to_string()),
            other => ErrorBody::new("Internal Server Error").with_details(other.to_string()),
        }
    }
}

/// Error payload: `{error, details?, usage?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            usage: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
