//! Wire envelopes shared by all endpoints.
//!
//! Successful calls return the platform object as-is. Lookups that find
//! nothing are not errors: they answer `200 {"error":"does_not_exist"}`.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

use crate::errors::ErrorDetail;

/// Error code used for lookups that found nothing.
pub const DOES_NOT_EXIST: &str = "does_not_exist";

/// Error envelope `{error, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    /// Error code for client handling (e.g. "unexpected_error", "does_not_exist").
    pub error: String,

    /// Human-readable error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Coded details, present for item payload errors and typed platform errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

impl ErrorEnvelope {
    /// Creates an envelope carrying only an error code.
    pub fn code(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            details: Vec::new(),
        }
    }

    /// Creates an envelope with an error code and message.
    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
            details: Vec::new(),
        }
    }
}

/// Result of a get-by-id-or-name lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
}

impl<T> Lookup<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Lookup::Missing)
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(item) => Lookup::Found(item),
            None => Lookup::Missing,
        }
    }
}

impl<T: Serialize> Serialize for Lookup<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Lookup::Found(item) => item.serialize(serializer),
            Lookup::Missing => ErrorEnvelope::code(DOES_NOT_EXIST).serialize(serializer),
        }
    }
}

impl<T: Serialize> IntoResponse for Lookup<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.into(),
            version: version.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_lookup_serializes_as_does_not_exist() {
        let lookup: Lookup<serde_json::Value> = None.into();
        assert_eq!(serde_json::to_value(&lookup).unwrap(), json!({"error": "does_not_exist"}));
    }

    #[test]
    fn test_found_lookup_serializes_transparently() {
        let lookup = Lookup::Found(json!({"id": "42", "displayName": "Investments"}));
        assert_eq!(
            serde_json::to_value(&lookup).unwrap(),
            json!({"id": "42", "displayName": "Investments"})
        );
    }

    #[test]
    fn test_envelope_omits_empty_fields() {
        let value = serde_json::to_value(ErrorEnvelope::code("invalid_api_key")).unwrap();
        assert_eq!(value, json!({"error": "invalid_api_key"}));
    }
}
