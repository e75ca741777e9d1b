//! Request bodies and query strings accepted by the workload endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Body for creating an eventhouse or a KQL database.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemCreateRequest {
    /// Display name of the new item.
    #[validate(length(min = 1, max = 256, message = "displayName must be 1-256 characters"))]
    pub display_name: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Body carrying a Polygon.io API key.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ApiKeyRequest {
    #[serde(rename = "apiKey")]
    #[validate(length(min = 1, message = "apiKey is required"))]
    pub api_key: String,
}

/// Query string of the KQL query endpoint.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct QueryParams {
    /// KQL query text or control command.
    #[validate(length(min = 1, message = "query is required"))]
    pub query: String,

    /// Database to run against; defaults to the database's display name.
    #[serde(default)]
    pub database_name: Option<String>,

    /// Cluster URI; defaults to the eventhouse query service URI.
    #[serde(default)]
    pub connection_string: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_display_name_is_rejected() {
        let request = ItemCreateRequest {
            display_name: String::new(),
            description: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_api_key_uses_camel_case() {
        let request: ApiKeyRequest = serde_json::from_str(r#"{"apiKey":"k"}"#).unwrap();
        assert_eq!(request.api_key, "k");
        assert!(request.validate().is_ok());
    }
}
