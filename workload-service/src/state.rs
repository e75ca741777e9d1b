//! 应用状态

use std::sync::Arc;

use common::config::{
    AppConfig, FabricEndpoints, InvestmentInsightsManifest, LroPolicy, ScopeConfig, WorkloadConfig,
};
use common::errors::AppResult;
use fabric_client::{
    ArtifactSource, DirArtifacts, FabricApi, HostTokenExchanger, PassthroughTokenExchanger,
    PlatformTransport, ReqwestTransport, TokenExchanger,
};
use tracing::warn;

use crate::service::items::ItemMetadataStore;

/// 所有处理器共享的状态；除条目元数据存储外全部只读
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub workload: Arc<WorkloadConfig>,
    pub scopes: Arc<ScopeConfig>,
    pub manifest: Arc<InvestmentInsightsManifest>,
    pub api: FabricApi,
    pub tokens: Arc<dyn TokenExchanger>,
    pub artifacts: Arc<dyn ArtifactSource>,
    pub items: Arc<ItemMetadataStore>,
}

impl AppState {
    /// 从环境变量构建生产状态
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let workload = WorkloadConfig::load();
        let transport: Arc<dyn PlatformTransport> =
            Arc::new(ReqwestTransport::new(config.http_timeout())?);
        let api = FabricApi::new(transport, FabricEndpoints::load(), LroPolicy::load());

        let tokens: Arc<dyn TokenExchanger> = match &workload.token_exchange_url {
            Some(url) => Arc::new(HostTokenExchanger::new(api.http.clone(), url.clone())),
            None => {
                warn!("未配置 TOKEN_EXCHANGE_URL，将直接转发调用方令牌");
                Arc::new(PassthroughTokenExchanger)
            }
        };
        let artifacts: Arc<dyn ArtifactSource> =
            Arc::new(DirArtifacts::new(workload.artifacts_dir.clone()));

        Ok(Self::from_parts(config, workload, api, tokens, artifacts))
    }

    /// 用给定的平台客户端、令牌交换与资源来源组装状态
    pub fn from_parts(
        config: AppConfig,
        workload: WorkloadConfig,
        api: FabricApi,
        tokens: Arc<dyn TokenExchanger>,
        artifacts: Arc<dyn ArtifactSource>,
    ) -> Self {
        Self {
            config,
            workload: Arc::new(workload),
            scopes: Arc::new(ScopeConfig::default()),
            manifest: Arc::new(InvestmentInsightsManifest::default()),
            api,
            tokens,
            artifacts,
            items: Arc::new(ItemMetadataStore::default()),
        }
    }
}
