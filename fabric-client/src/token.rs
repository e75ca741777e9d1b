//! On-behalf-of token exchange seam.
//!
//! The exchange itself belongs to the host runtime. We either call its
//! exchange endpoint or, when none is configured, forward the caller's token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::errors::{AppError, AppResult};
use common::middleware::AuthorizationContext;

use crate::http::FabricHttp;

/// Swaps the caller's token for one scoped to a downstream resource.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, caller: &AuthorizationContext, scopes: &[String]) -> AppResult<String>;
}

/// Forwards the caller's own token unchanged.
#[derive(Debug, Clone, Default)]
pub struct PassthroughTokenExchanger;

#[async_trait]
impl TokenExchanger for PassthroughTokenExchanger {
    async fn exchange(&self, caller: &AuthorizationContext, _scopes: &[String]) -> AppResult<String> {
        Ok(caller.downstream_token().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    scopes: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    access_token: String,
}

/// Calls the host runtime's exchange endpoint with the caller's token.
pub struct HostTokenExchanger {
    http: FabricHttp,
    url: String,
}

impl HostTokenExchanger {
    pub fn new(http: FabricHttp, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TokenExchanger for HostTokenExchanger {
    async fn exchange(&self, caller: &AuthorizationContext, scopes: &[String]) -> AppResult<String> {
        let response = self
            .http
            .post_json(&self.url, caller.downstream_token(), &ExchangeRequest { scopes })
            .await?;
        if !response.is_success() {
            tracing::error!(status = response.status, scopes = ?scopes, "token exchange rejected");
            return Err(AppError::TokenExchange(format!(
                "exchange endpoint returned {}",
                response.status
            )));
        }
        let exchanged: ExchangeResponse = response
            .json()
            .map_err(|e| AppError::TokenExchange(e.to_string()))?;
        Ok(exchanged.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use serde_json::json;

    use crate::testing::ScriptedTransport;
    use crate::transport::{PlatformResponse, RequestBody};

    fn caller() -> AuthorizationContext {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"scp":"Item1.Read.All"}"#);
        let token = format!("h.{payload}.s");
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        AuthorizationContext::from_headers(&headers).unwrap()
    }

    #[tokio::test]
    async fn test_passthrough_returns_caller_token() {
        let caller = caller();
        let token = PassthroughTokenExchanger.exchange(&caller, &[]).await.unwrap();
        assert_eq!(token, caller.user_token);
    }

    #[tokio::test]
    async fn test_host_exchange_posts_scopes() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            200,
            r#"{"accessToken":"downstream"}"#,
        )]));
        let exchanger = HostTokenExchanger::new(FabricHttp::new(transport.clone()), "http://host/token");
        let scopes = vec!["https://api.fabric.microsoft.com/.default".to_string()];

        let token = exchanger.exchange(&caller(), &scopes).await.unwrap();

        assert_eq!(token, "downstream");
        assert_eq!(
            transport.requests()[0].body,
            RequestBody::Json(json!({"scopes": ["https://api.fabric.microsoft.com/.default"]}))
        );
    }

    #[tokio::test]
    async fn test_host_exchange_failure_is_token_exchange_error() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(403, "")]));
        let exchanger = HostTokenExchanger::new(FabricHttp::new(transport), "http://host/token");
        let err = exchanger.exchange(&caller(), &[]).await.unwrap_err();
        assert!(matches!(err, AppError::TokenExchange(_)));
    }
}
