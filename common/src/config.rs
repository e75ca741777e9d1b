//! Environment-driven configuration.
//!
//! Each concern gets its own struct, loaded once at startup and handed to the
//! handlers through the service state. Nothing here is global.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

/// Server configuration shared by every binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// Timeout applied to each outbound HTTP request.
    pub http_timeout_secs: u64,
}

impl AppConfig {
    /// Loads the server configuration for the named service.
    pub fn load_with_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: env_parse("SERVER_PORT", 5000),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", 100),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Base URLs of the platform services we talk to.
#[derive(Debug, Clone)]
pub struct FabricEndpoints {
    /// Fabric REST API, e.g. `https://api.fabric.microsoft.com`.
    pub api_base_url: String,
    /// OneLake DFS endpoint, e.g. `https://onelake.dfs.fabric.microsoft.com`.
    pub onelake_dfs_url: String,
    /// Resource id used to request OneLake tokens.
    pub onelake_resource_id: String,
    /// URL probed to validate a Polygon.io API key.
    pub polygon_validation_url: String,
}

impl Default for FabricEndpoints {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.fabric.microsoft.com".to_string(),
            onelake_dfs_url: "https://onelake.dfs.fabric.microsoft.com".to_string(),
            onelake_resource_id: "https://storage.azure.com".to_string(),
            polygon_validation_url: "https://api.polygon.io/v2/aggs/ticker/MSFT/prev".to_string(),
        }
    }
}

impl FabricEndpoints {
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: trim_url(env_or("FABRIC_API_BASE_URL", &defaults.api_base_url)),
            onelake_dfs_url: trim_url(env_or("ONELAKE_DFS_URL", &defaults.onelake_dfs_url)),
            onelake_resource_id: trim_url(env_or(
                "ONELAKE_RESOURCE_ID",
                &defaults.onelake_resource_id,
            )),
            polygon_validation_url: env_or(
                "POLYGON_VALIDATION_URL",
                &defaults.polygon_validation_url,
            ),
        }
    }

    /// Scopes for a token accepted by the Fabric REST API.
    pub fn fabric_api_scopes(&self) -> Vec<String> {
        vec![format!("{}/.default", self.api_base_url)]
    }

    /// Scopes for a token accepted by OneLake.
    pub fn onelake_scopes(&self) -> Vec<String> {
        vec![format!("{}/.default", self.onelake_resource_id)]
    }

    /// Host part of the OneLake endpoint, used inside `abfss://` URIs.
    pub fn onelake_host(&self) -> &str {
        self.onelake_dfs_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.onelake_dfs_url)
            .trim_end_matches('/')
    }

    /// `{api}/v1/{path}`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

/// Bounds for the long running operation poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LroPolicy {
    /// Interval used when the platform sends no usable `Retry-After`.
    pub default_retry_after: Duration,
    /// Maximum number of status polls.
    pub max_attempts: u32,
    /// Maximum total time spent waiting.
    pub timeout: Duration,
}

impl Default for LroPolicy {
    fn default() -> Self {
        Self {
            default_retry_after: Duration::from_secs(30),
            max_attempts: 120,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl LroPolicy {
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            default_retry_after: Duration::from_secs(env_parse(
                "LRO_DEFAULT_RETRY_AFTER_SECS",
                defaults.default_retry_after.as_secs(),
            )),
            max_attempts: env_parse("LRO_MAX_ATTEMPTS", defaults.max_attempts),
            timeout: Duration::from_secs(env_parse("LRO_TIMEOUT_SECS", defaults.timeout.as_secs())),
        }
    }
}

/// A named list of scopes; a caller passes the gate with any one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(scopes.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }
}

impl std::fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// Scope names understood by the workload.
pub mod scopes {
    pub const ITEM1_READ_ALL: &str = "Item1.Read.All";
    pub const ITEM1_READ_WRITE_ALL: &str = "Item1.ReadWrite.All";
    pub const CONNECTION_READ_WRITE_ALL: &str = "Connection.ReadWrite.All";
    pub const DATA_PIPELINE_READ_WRITE_ALL: &str = "DataPipeline.ReadWrite.All";
    pub const EVENTHOUSE_READ_WRITE_ALL: &str = "Eventhouse.ReadWrite.All";
    pub const KQL_DATABASE_READ_WRITE_ALL: &str = "KQLDatabase.ReadWrite.All";
    pub const LAKEHOUSE_READ_WRITE_ALL: &str = "Lakehouse.ReadWrite.All";
    pub const FABRIC_LAKEHOUSE_READ_ALL: &str = "FabricLakehouse.Read.All";
    pub const FABRIC_LAKEHOUSE_READ_WRITE_ALL: &str = "FabricLakehouse.ReadWrite.All";
    pub const WORKSPACE_READ_WRITE_ALL: &str = "Workspace.ReadWrite.All";
}

/// Per-endpoint scope gates.
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    pub write_eventhouse: ScopeSet,
    pub write_workspace: ScopeSet,
    pub write_pipeline: ScopeSet,
    pub read_lakehouse: ScopeSet,
    pub item_read: ScopeSet,
    pub item_write: ScopeSet,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        use scopes::*;
        Self {
            write_eventhouse: ScopeSet::new([
                WORKSPACE_READ_WRITE_ALL,
                FABRIC_LAKEHOUSE_READ_WRITE_ALL,
                EVENTHOUSE_READ_WRITE_ALL,
                KQL_DATABASE_READ_WRITE_ALL,
            ]),
            write_workspace: ScopeSet::new([
                WORKSPACE_READ_WRITE_ALL,
                FABRIC_LAKEHOUSE_READ_WRITE_ALL,
                LAKEHOUSE_READ_WRITE_ALL,
                KQL_DATABASE_READ_WRITE_ALL,
            ]),
            write_pipeline: ScopeSet::new([
                WORKSPACE_READ_WRITE_ALL,
                FABRIC_LAKEHOUSE_READ_WRITE_ALL,
                CONNECTION_READ_WRITE_ALL,
                DATA_PIPELINE_READ_WRITE_ALL,
            ]),
            read_lakehouse: ScopeSet::new([FABRIC_LAKEHOUSE_READ_ALL, FABRIC_LAKEHOUSE_READ_WRITE_ALL]),
            item_read: ScopeSet::new([ITEM1_READ_ALL, ITEM1_READ_WRITE_ALL]),
            item_write: ScopeSet::new([ITEM1_READ_WRITE_ALL]),
        }
    }
}

/// Workload identity and frontend placeholder ids.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadConfig {
    pub workload_name: String,
    pub backend_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_eventhouse_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_database_id: Option<String>,
    /// Directory holding the KQL, sample data, connection and pipeline artifacts.
    #[serde(skip)]
    pub artifacts_dir: PathBuf,
    /// Host runtime endpoint performing the on-behalf-of exchange.
    #[serde(skip)]
    pub token_exchange_url: Option<String>,
}

impl WorkloadConfig {
    pub fn load() -> Self {
        Self {
            workload_name: env_or("WORKLOAD_NAME", "Org.WorkloadSample"),
            backend_url: env_or("WORKLOAD_BE_URL", "http://127.0.0.1:5000"),
            default_workspace_id: env_opt("DEFAULT_WORKSPACE_ID"),
            default_eventhouse_id: env_opt("DEFAULT_EVENTHOUSE_ID"),
            default_database_id: env_opt("DEFAULT_DATABASE_ID"),
            artifacts_dir: PathBuf::from(env_or("ARTIFACTS_DIR", "Artifacts")),
            token_exchange_url: env_opt("TOKEN_EXCHANGE_URL"),
        }
    }

    /// Fully qualified item type, e.g. `Org.WorkloadSample.InvestmentInsights`.
    pub fn item_type(&self, name: &str) -> String {
        format!("{}.{}", self.workload_name, name)
    }
}

/// A sample data file and the table it is ingested into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDataArtifact {
    pub filename: String,
    pub table: String,
}

/// An artifact that becomes a platform item of the given display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArtifact {
    pub filename: String,
    pub name: String,
}

/// What the Investment Insights provisioning flows create.
#[derive(Debug, Clone)]
pub struct InvestmentInsightsManifest {
    pub eventhouse_name: String,
    pub eventhouse_description: String,
    pub settings_lakehouse_name: String,
    pub settings_lakehouse_description: String,
    pub settings_file: String,
    /// Control commands executed in order against the KQL database.
    pub kql_ddl: Vec<String>,
    pub sample_data: Vec<SampleDataArtifact>,
    pub data_pipelines: Vec<NamedArtifact>,
    pub connections: Vec<NamedArtifact>,
}

impl Default for InvestmentInsightsManifest {
    fn default() -> Self {
        let ddl = [
            "raw_daily_ohlc",
            "raw_market_stream",
            "daily_ohlc",
            "aggregates",
            "latest_prices",
            "trades",
            "stocks",
            "vw_Activity",
            "vw_ClientDetails",
            "vw_PerformanceByDay",
            "vw_PortfolioValue",
            "vw_StockOHLC",
        ];
        let sample = |file: &str, table: &str| SampleDataArtifact {
            filename: format!("InvestmentInsights/SampleData/{file}"),
            table: table.to_string(),
        };

        Self {
            eventhouse_name: "Investments".to_string(),
            eventhouse_description: "Investment Insights Market Data".to_string(),
            settings_lakehouse_name: "WorkloadSettings".to_string(),
            settings_lakehouse_description: "WorkloadSettings Lakehouse".to_string(),
            settings_file: "InvestmentInsights.Settings.json".to_string(),
            kql_ddl: ddl
                .iter()
                .map(|name| format!("InvestmentInsights/KQL/{name}.kql"))
                .collect(),
            sample_data: vec![
                sample("holdings.csv", "holdings"),
                sample("portfolios.csv", "portfolios"),
                sample("stocks.csv", "stocks"),
            ],
            data_pipelines: vec![NamedArtifact {
                filename: "InvestmentInsights/Pipelines/historical_data_ingestion.json".to_string(),
                name: "Historical Stock Ingestion".to_string(),
            }],
            connections: vec![NamedArtifact {
                filename: "InvestmentInsights/Connections/polygonio.json".to_string(),
                name: "Polygon.io".to_string(),
            }],
        }
    }
}

/// Loads a `.env` file from the working directory (best-effort, no error if missing).
///
/// Variables already present in the environment win.
pub fn load_dotenv() {
    let Ok(content) = std::fs::read_to_string(".env") else {
        return;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fabric_scopes_use_default_suffix() {
        let endpoints = FabricEndpoints::default();
        assert_eq!(
            endpoints.fabric_api_scopes(),
            vec!["https://api.fabric.microsoft.com/.default".to_string()]
        );
        assert_eq!(endpoints.onelake_host(), "onelake.dfs.fabric.microsoft.com");
        assert_eq!(
            endpoints.api_url("/workspaces/ws/eventhouses"),
            "https://api.fabric.microsoft.com/v1/workspaces/ws/eventhouses"
        );
    }

    #[test]
    fn test_default_lro_policy_polls_every_thirty_seconds() {
        let policy = LroPolicy::default();
        assert_eq!(policy.default_retry_after, Duration::from_secs(30));
        assert!(policy.max_attempts > 0);
    }

    #[test]
    fn test_manifest_lists_ddl_in_dependency_order() {
        let manifest = InvestmentInsightsManifest::default();
        assert_eq!(manifest.kql_ddl.len(), 12);
        assert_eq!(manifest.kql_ddl[0], "InvestmentInsights/KQL/raw_daily_ohlc.kql");
        assert!(manifest.kql_ddl.last().unwrap().ends_with("vw_StockOHLC.kql"));
    }

    #[test]
    fn test_item_type_is_qualified_by_workload() {
        let mut config = WorkloadConfig::load();
        config.workload_name = "Org.WorkloadSample".into();
        assert_eq!(
            config.item_type("InvestmentInsights"),
            "Org.WorkloadSample.InvestmentInsights"
        );
    }
}
