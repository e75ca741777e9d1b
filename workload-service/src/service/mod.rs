//! 业务逻辑层

pub mod eventhouse;
pub mod items;
pub mod provisioning;

use common::errors::AppResult;
use common::middleware::{AuthorizationContext, RequestId};
use fabric_client::FabricApi;

use crate::state::AppState;

/// 一次请求内访问平台所需的上下文：调用方身份与带请求 ID 的客户端
pub struct Session<'a> {
    pub state: &'a AppState,
    pub auth: &'a AuthorizationContext,
    pub api: FabricApi,
}

impl<'a> Session<'a> {
    pub fn new(state: &'a AppState, auth: &'a AuthorizationContext, request_id: &RequestId) -> Self {
        Self {
            state,
            auth,
            api: state.api.for_request(request_id.as_str()),
        }
    }

    /// 换取 Fabric REST API 令牌
    pub async fn fabric_token(&self) -> AppResult<String> {
        let scopes = self.api.endpoints.fabric_api_scopes();
        self.state.tokens.exchange(self.auth, &scopes).await
    }

    /// 换取 OneLake 令牌
    pub async fn onelake_token(&self) -> AppResult<String> {
        let scopes = self.api.endpoints.onelake_scopes();
        self.state.tokens.exchange(self.auth, &scopes).await
    }

    /// 换取分析集群令牌，作用域为 `{cluster}/.default`
    pub async fn cluster_token(&self, cluster_uri: &str) -> AppResult<String> {
        let scopes = vec![format!("{}/.default", cluster_uri.trim_end_matches('/'))];
        self.state.tokens.exchange(self.auth, &scopes).await
    }
}
