//! Application error types.
//!
//! Every failure in the backend is an [`AppError`]. Handlers return
//! `Result<_, AppError>` and the [`IntoResponse`] impl renders the
//! `{error, message}` envelope with the matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::response::ErrorEnvelope;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Error code returned when the platform rejects a request without a typed body.
pub const UPSTREAM_ERROR: &str = "upstream_error";
/// Error code for anything the caller cannot act on.
pub const UNEXPECTED_ERROR: &str = "unexpected_error";
/// Error code for an item payload that failed validation.
pub const INVALID_ITEM_PAYLOAD: &str = "InvalidItemPayload";
/// Detail code attached when an item payload has no lakehouse reference.
pub const MISSING_LAKEHOUSE_REFERENCE: &str = "MissingLakehouseReference";
/// Error code for a caller lacking every allowed scope.
pub const ACCESS_DENIED: &str = "AccessDenied";

/// Application error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// The platform answered with a non-success status.
    #[error("upstream request failed with status {status}: {}", .body.message())]
    Upstream { status: u16, body: UpstreamErrorBody },

    /// A 202 Accepted response arrived without a `Location` header.
    #[error("operation URL not found in response headers")]
    MissingOperationLocation,

    /// The long running operation reached a terminal, unsuccessful state.
    #[error("long running operation ended as {status}: {message}")]
    OperationFailed { status: String, message: String },

    /// The long running operation outlived the configured bound.
    #[error("long running operation still pending after {attempts} polls ({elapsed_secs}s)")]
    OperationTimeout { attempts: u32, elapsed_secs: u64 },

    #[error("missing or malformed bearer token")]
    Unauthorized,

    #[error("caller token carries none of the required scopes: {0}")]
    AccessDenied(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// Item create/update payload rejected; details carry the error codes.
    #[error("invalid payload for item {item_type} ({item_id})")]
    InvalidItemPayload {
        item_type: String,
        item_id: String,
        details: Vec<ErrorDetail>,
    },

    /// A prerequisite resource of a multi-step flow is absent.
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl AppError {
    /// Builds an upstream error from a status code and raw response body.
    pub fn upstream(status: u16, raw_body: &str) -> Self {
        Self::Upstream {
            status,
            body: UpstreamErrorBody::parse(raw_body),
        }
    }

    /// Builds an invalid item payload error with optional detail code.
    pub fn invalid_item_payload(
        item_type: impl Into<String>,
        item_id: impl Into<String>,
        detail: Option<ErrorDetail>,
    ) -> Self {
        Self::InvalidItemPayload {
            item_type: item_type.into(),
            item_id: item_id.into(),
            details: detail.into_iter().collect(),
        }
    }

    /// HTTP status this error renders with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream { .. }
            | Self::Validation(_)
            | Self::InvalidItemPayload { .. }
            | Self::Unsupported(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MissingOperationLocation
            | Self::OperationFailed { .. }
            | Self::OperationTimeout { .. }
            | Self::TokenExchange(_)
            | Self::ExternalService(_)
            | Self::Serialization(_)
            | Self::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into its wire envelope.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        match self {
            Self::Upstream { body, .. } => ErrorEnvelope {
                error: body.code().unwrap_or(UPSTREAM_ERROR).to_string(),
                message: Some(body.message().to_string()),
                details: body.details().to_vec(),
            },
            Self::Unauthorized => ErrorEnvelope::with_message("unauthorized", self.to_string()),
            Self::AccessDenied(_) => ErrorEnvelope::with_message(ACCESS_DENIED, self.to_string()),
            Self::Validation(message) => {
                ErrorEnvelope::with_message("validation_error", message.clone())
            }
            Self::InvalidItemPayload { details, .. } => ErrorEnvelope {
                error: INVALID_ITEM_PAYLOAD.to_string(),
                message: Some(self.to_string()),
                details: details.clone(),
            },
            Self::NotFound(_) => ErrorEnvelope::with_message("does_not_exist", self.to_string()),
            Self::Unsupported(message) => ErrorEnvelope::with_message("unsupported", message.clone()),
            _ => ErrorEnvelope::with_message(UNEXPECTED_ERROR, self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(self.to_envelope())).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::ExternalService(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

/// A single coded error detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub error_code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorDetail {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

/// Error body as documented by the platform REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformErrorBody {
    pub error_code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub more_details: Vec<ErrorDetail>,
}

/// Upstream error body, parsed defensively.
///
/// A body that does not match [`PlatformErrorBody`] is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamErrorBody {
    Platform(PlatformErrorBody),
    Raw(String),
}

impl UpstreamErrorBody {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<PlatformErrorBody>(raw) {
            Ok(body) => Self::Platform(body),
            Err(_) => Self::Raw(raw.to_string()),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Platform(body) => Some(&body.error_code),
            Self::Raw(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Platform(body) => &body.message,
            Self::Raw(raw) => raw,
        }
    }

    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            Self::Platform(body) => &body.more_details,
            Self::Raw(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_body_is_typed() {
        let raw = r#"{"errorCode":"ItemDisplayNameAlreadyInUse","message":"Requested name is in use","requestId":"abc"}"#;
        let err = AppError::upstream(400, raw);
        let envelope = err.to_envelope();
        assert_eq!(envelope.error, "ItemDisplayNameAlreadyInUse");
        assert_eq!(envelope.message.as_deref(), Some("Requested name is in use"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unexpected_body_falls_back_to_raw() {
        let body = UpstreamErrorBody::parse("<html>gateway timeout</html>");
        assert_eq!(body, UpstreamErrorBody::Raw("<html>gateway timeout</html>".into()));
        let envelope = AppError::Upstream { status: 504, body }.to_envelope();
        assert_eq!(envelope.error, UPSTREAM_ERROR);
        assert_eq!(envelope.message.as_deref(), Some("<html>gateway timeout</html>"));
    }

    #[test]
    fn test_json_without_error_code_is_raw() {
        let body = UpstreamErrorBody::parse(r#"{"message":"nope"}"#);
        assert!(matches!(body, UpstreamErrorBody::Raw(_)));
    }

    #[test]
    fn test_internal_errors_render_as_unexpected() {
        let err = AppError::OperationTimeout {
            attempts: 3,
            elapsed_secs: 90,
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_envelope().error, UNEXPECTED_ERROR);
    }

    #[test]
    fn test_invalid_item_payload_carries_detail_code() {
        let err = AppError::invalid_item_payload(
            "Org.WorkloadSample.InvestmentInsights",
            "item-1",
            Some(ErrorDetail::new(MISSING_LAKEHOUSE_REFERENCE, "Missing Lakehouse reference")),
        );
        let envelope = err.to_envelope();
        assert_eq!(envelope.error, INVALID_ITEM_PAYLOAD);
        assert_eq!(envelope.details[0].error_code, MISSING_LAKEHOUSE_REFERENCE);
    }
}
