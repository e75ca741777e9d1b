//! HTTP transport seam.
//!
//! Every platform call goes through [`PlatformTransport`]. Production uses
//! [`ReqwestTransport`]; tests plug in an in-memory platform.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;

use common::errors::{AppError, AppResult};
use common::middleware::{CLIENT_REQUEST_ID_HEADER, SUBJECT_AND_APP_TOKEN_PREFIX};

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Text { content: String, content_type: &'static str },
}

/// An outbound platform request.
#[derive(Debug, Clone)]
pub struct PlatformRequest {
    pub method: Method,
    pub url: String,
    /// Access token; `None` sends no `Authorization` header.
    pub token: Option<String>,
    /// Correlation id forwarded as `x-ms-client-request-id`.
    pub request_id: Option<String>,
    pub body: RequestBody,
}

impl PlatformRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            token: None,
            request_id: None,
            body: RequestBody::Empty,
        }
    }

    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

/// A platform response, fully buffered.
#[derive(Debug, Clone, Default)]
pub struct PlatformResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl PlatformResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            AppError::Serialization(format!("unexpected response body (status {}): {e}", self.status))
        })
    }

    /// Turns a non-success response into an upstream error; passes success through.
    pub fn error_for_status(self) -> AppResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AppError::upstream(self.status, &self.body))
        }
    }
}

/// Sends requests to the platform.
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    async fn send(&self, request: PlatformRequest) -> AppResult<PlatformResponse>;
}

/// Value of the `Authorization` header for a token.
///
/// Composite subject-and-app tokens already carry their scheme and are sent
/// verbatim; anything else is a bearer token.
pub fn authorization_header(token: &str) -> String {
    if token.starts_with(SUBJECT_AND_APP_TOKEN_PREFIX) {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

/// [`PlatformTransport`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ExternalService(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PlatformTransport for ReqwestTransport {
    async fn send(&self, request: PlatformRequest) -> AppResult<PlatformResponse> {
        let mut builder = self.client.request(request.method, &request.url);

        if let Some(token) = request.token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&authorization_header(token))
                .map_err(|_| AppError::Unauthorized)?;
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(id) = &request.request_id {
            builder = builder.header(CLIENT_REQUEST_ID_HEADER.clone(), id.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Text {
                content,
                content_type,
            } => builder.header(CONTENT_TYPE, content_type).body(content),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(PlatformResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_and_app_token_is_not_prefixed() {
        assert_eq!(authorization_header("abc"), "Bearer abc");
        let composite = r#"SubjectAndAppToken1.0 subjectToken="a", appToken="b""#;
        assert_eq!(authorization_header(composite), composite);
    }

    #[test]
    fn test_error_for_status_keeps_platform_body() {
        let response = PlatformResponse::new(
            409,
            r#"{"errorCode":"ItemDisplayNameAlreadyInUse","message":"taken"}"#,
        );
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.to_envelope().error, "ItemDisplayNameAlreadyInUse");
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let response = PlatformResponse::new(202, "").with_header("Retry-After", "5");
        assert_eq!(response.header("retry-after"), Some("5"));
        assert_eq!(response.header("RETRY-AFTER"), Some("5"));
    }
}
