//! Request helpers shared by the platform clients.

use std::sync::Arc;

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use common::config::{FabricEndpoints, LroPolicy};
use common::errors::AppResult;

use crate::transport::{PlatformRequest, PlatformResponse, PlatformTransport, RequestBody};

/// Thin wrapper over a transport that logs each call and stamps the request id.
#[derive(Clone)]
pub struct FabricHttp {
    transport: Arc<dyn PlatformTransport>,
    request_id: Option<String>,
}

impl FabricHttp {
    pub fn new(transport: Arc<dyn PlatformTransport>) -> Self {
        Self {
            transport,
            request_id: None,
        }
    }

    /// Same transport, forwarding `request_id` on every call.
    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            request_id: Some(request_id.into()),
        }
    }

    pub async fn send(&self, mut request: PlatformRequest) -> AppResult<PlatformResponse> {
        tracing::info!(method = %request.method, url = %request.url, "sending platform request");
        if request.request_id.is_none() {
            request.request_id = self.request_id.clone();
        }
        let response = self.transport.send(request).await?;
        tracing::debug!(status = response.status, "platform responded");
        Ok(response)
    }

    pub async fn get(&self, url: &str, token: &str) -> AppResult<PlatformResponse> {
        self.send(PlatformRequest::new(Method::GET, url).token(token)).await
    }

    pub async fn head(&self, url: &str, token: &str) -> AppResult<PlatformResponse> {
        self.send(PlatformRequest::new(Method::HEAD, url).token(token)).await
    }

    pub async fn delete(&self, url: &str, token: &str) -> AppResult<PlatformResponse> {
        self.send(PlatformRequest::new(Method::DELETE, url).token(token)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> AppResult<PlatformResponse> {
        let body = RequestBody::Json(serde_json::to_value(body)?);
        self.send(PlatformRequest::new(Method::POST, url).token(token).body(body))
            .await
    }

    /// POSTs an already serialized JSON document.
    pub async fn post_raw_json(&self, url: &str, token: &str, json: String) -> AppResult<PlatformResponse> {
        let body = RequestBody::Text {
            content: json,
            content_type: "application/json",
        };
        self.send(PlatformRequest::new(Method::POST, url).token(token).body(body))
            .await
    }

    /// GET, fail on non-success, parse JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, token: &str) -> AppResult<T> {
        self.get(url, token).await?.error_for_status()?.json()
    }
}

/// Everything a platform client needs: transport, endpoints and LRO bounds.
#[derive(Clone)]
pub struct FabricApi {
    pub http: FabricHttp,
    pub endpoints: Arc<FabricEndpoints>,
    pub lro: Arc<LroPolicy>,
}

impl FabricApi {
    pub fn new(transport: Arc<dyn PlatformTransport>, endpoints: FabricEndpoints, lro: LroPolicy) -> Self {
        Self {
            http: FabricHttp::new(transport),
            endpoints: Arc::new(endpoints),
            lro: Arc::new(lro),
        }
    }

    /// A copy of this api that forwards `request_id` downstream.
    pub fn for_request(&self, request_id: &str) -> Self {
        Self {
            http: self.http.with_request_id(request_id),
            endpoints: Arc::clone(&self.endpoints),
            lro: Arc::clone(&self.lro),
        }
    }

    /// `{api}/v1/workspaces/{ws}/{collection}`.
    pub fn workspace_url(&self, workspace_id: &str, collection: &str) -> String {
        self.endpoints
            .api_url(&format!("workspaces/{workspace_id}/{collection}"))
    }
}
