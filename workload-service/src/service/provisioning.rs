//! Investment Insights 资源编排
//!
//! 每个资源都按“先按名称查找，不存在再创建”处理，重复调用不会产生重复资源。
//! 查找与创建之间没有锁：两个并发请求仍可能各自创建一份（已知竞态，按单写者低频
//! 调用假设不处理）。DDL 与数据导入按顺序执行，中途失败不回滚。

use std::future::Future;

use common::config::InvestmentInsightsManifest;
use common::errors::{AppError, AppResult};
use common::models::{Connection, DataPipeline, KqlDatabase, Lakehouse};
use common::utils::{kql, template};
use fabric_client::{
    lakehouse_file_path, ArtifactSource, ConnectionClient, DataPipelineClient, EventhouseClient,
    KustoClient, LakehouseClient, OneLakeClient,
};
use tracing::{info, warn};

use super::Session;

/// 设置文件的读取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadSettings {
    /// 工作区中没有设置 Lakehouse
    NoLakehouse,
    /// Lakehouse 存在但设置文件缺失或为空
    NoSettingsFile,
    /// 设置文件原文
    Content(String),
}

/// 已存在则复用，否则调用 `create` 创建
pub async fn get_or_create<T, F, Fut>(kind: &'static str, name: &str, existing: Option<T>, create: F) -> AppResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match existing {
        Some(item) => {
            info!(kind, name, "资源已存在，直接复用");
            Ok(item)
        }
        None => {
            info!(kind, name, "资源不存在，开始创建");
            create().await
        }
    }
}

pub struct Provisioner<'a> {
    session: &'a Session<'a>,
    manifest: &'a InvestmentInsightsManifest,
    artifacts: &'a dyn ArtifactSource,
}

impl<'a> Provisioner<'a> {
    pub fn new(session: &'a Session<'a>) -> Self {
        Self {
            session,
            manifest: session.state.manifest.as_ref(),
            artifacts: session.state.artifacts.as_ref(),
        }
    }

    /// 查找工作区中的设置 Lakehouse
    pub async fn settings_lakehouse(&self, token: &str, workspace_id: &str) -> AppResult<Option<Lakehouse>> {
        LakehouseClient::new(self.session.api.clone())
            .get_lakehouse(token, workspace_id, &self.manifest.settings_lakehouse_name)
            .await
    }

    /// 读取设置文件
    pub async fn read_settings(&self, workspace_id: &str) -> AppResult<WorkloadSettings> {
        let token = self.session.fabric_token().await?;
        let Some(lakehouse) = self.settings_lakehouse(&token, workspace_id).await? else {
            return Ok(WorkloadSettings::NoLakehouse);
        };

        let onelake_token = self.session.onelake_token().await?;
        let lakehouse_workspace = lakehouse.workspace_id.as_deref().unwrap_or(workspace_id);
        let path = lakehouse_file_path(lakehouse_workspace, &lakehouse.id, &self.manifest.settings_file);
        let content = OneLakeClient::new(self.session.api.clone())
            .read_file(&onelake_token, &path)
            .await?;

        Ok(match content {
            Some(text) if !text.trim().is_empty() => WorkloadSettings::Content(text),
            _ => WorkloadSettings::NoSettingsFile,
        })
    }

    /// 确保设置 Lakehouse 存在，并上传全部样例数据
    pub async fn ensure_settings_lakehouse(&self, workspace_id: &str) -> AppResult<Lakehouse> {
        let token = self.session.fabric_token().await?;
        let onelake_token = self.session.onelake_token().await?;
        let lakehouses = LakehouseClient::new(self.session.api.clone());

        let existing = self.settings_lakehouse(&token, workspace_id).await?;
        let lakehouse = get_or_create("Lakehouse", &self.manifest.settings_lakehouse_name, existing, || {
            lakehouses.create_lakehouse(
                &token,
                workspace_id,
                &self.manifest.settings_lakehouse_name,
                Some(self.manifest.settings_lakehouse_description.as_str()),
            )
        })
        .await?;

        let onelake = OneLakeClient::new(self.session.api.clone());
        for sample in &self.manifest.sample_data {
            let content = self.artifacts.read(&sample.filename).await?;
            let path = lakehouse_file_path(workspace_id, &lakehouse.id, &sample.filename);
            onelake.write_file(&onelake_token, &path, &content).await?;
        }

        info!(workspace_id, lakehouse_id = %lakehouse.id, files = self.manifest.sample_data.len(), "设置 Lakehouse 就绪");
        Ok(lakehouse)
    }

    /// 创建 Eventhouse 与 KQL 数据库，执行 DDL 并导入样例数据
    pub async fn provision_eventhouse(&self, workspace_id: &str) -> AppResult<KqlDatabase> {
        let token = self.session.fabric_token().await?;
        let settings = self
            .settings_lakehouse(&token, workspace_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} lakehouse", self.manifest.settings_lakehouse_name)))?;

        let client = EventhouseClient::new(self.session.api.clone());
        let name = &self.manifest.eventhouse_name;
        let description = Some(self.manifest.eventhouse_description.as_str());

        let existing = client.get_eventhouse(&token, workspace_id, name).await?;
        let eventhouse = get_or_create("Eventhouse", name, existing, || {
            client.create_eventhouse(&token, workspace_id, name, description)
        })
        .await?;

        let existing = client.get_kql_database(&token, workspace_id, name).await?;
        let database = get_or_create("KQLDatabase", name, existing, || {
            client.create_kql_database(&token, workspace_id, &eventhouse.id, name, description)
        })
        .await?;

        let cluster = database
            .query_service_uri()
            .or_else(|| eventhouse.query_service_uri())
            .map(str::to_string)
            .ok_or_else(|| AppError::ExternalService(format!("KQL database {} has no query service URI", database.id)))?;
        let cluster_token = self.session.cluster_token(&cluster).await?;
        let kusto = KustoClient::new(self.session.api.http.clone());

        for (step, artifact) in self.manifest.kql_ddl.iter().enumerate() {
            let command = self.artifacts.read(artifact).await?;
            kusto
                .execute(&cluster_token, &cluster, &database.display_name, &command)
                .await
                .inspect_err(|e| warn!(step = step + 1, artifact = %artifact, error = %e, "DDL 执行失败，之前的步骤已生效"))?;
        }

        let onelake_host = self.session.api.endpoints.onelake_host().to_string();
        for sample in &self.manifest.sample_data {
            let command = kql::ingest_from_onelake(&sample.table, workspace_id, &onelake_host, &settings.id, &sample.filename);
            kusto
                .execute(&cluster_token, &cluster, &database.display_name, &command)
                .await?;
        }

        info!(workspace_id, database_id = %database.id, "Investment Insights Eventhouse 就绪");
        Ok(database)
    }

    /// 创建 Polygon.io 连接与数据管道
    pub async fn provision_pipelines(&self, workspace_id: &str, api_key: &str) -> AppResult<()> {
        let token = self.session.fabric_token().await?;
        let database = EventhouseClient::new(self.session.api.clone())
            .get_kql_database(&token, workspace_id, &self.manifest.eventhouse_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("KQL database {}", self.manifest.eventhouse_name)))?;

        let mut connection: Option<Connection> = None;
        let connections = ConnectionClient::new(self.session.api.clone());
        for artifact in &self.manifest.connections {
            let existing = connections.get_connection(&token, &artifact.name).await?;
            let created = get_or_create("Connection", &artifact.name, existing, || async {
                let payload = self.artifacts.read(&artifact.filename).await?;
                connections.create_connection(&token, &artifact.name, payload).await
            })
            .await?;
            connection = Some(created);
        }
        let connection_id = connection.map(|c| c.id).unwrap_or_default();
        let endpoint = database.query_service_uri().unwrap_or_default();

        let pipelines = DataPipelineClient::new(self.session.api.clone());
        for artifact in &self.manifest.data_pipelines {
            let existing = pipelines.get_data_pipeline(&token, workspace_id, &artifact.name).await?;
            let _pipeline: DataPipeline = get_or_create("DataPipeline", &artifact.name, existing, || async {
                let raw = self.artifacts.read(&artifact.filename).await?;
                let content = template::render(
                    &raw,
                    &[
                        ("WORKSPACE_ID", workspace_id),
                        ("EVENTHOUSE_ENDPOINT", endpoint),
                        ("KQLDATABASE_ID", database.id.as_str()),
                        ("POLYGON_CONNECTION_ID", connection_id.as_str()),
                        ("POLYGON_API_KEY", api_key),
                    ],
                );
                let missing = template::unresolved(&content);
                if !missing.is_empty() {
                    warn!(artifact = %artifact.filename, ?missing, "管道模板仍有未替换的占位符");
                }
                pipelines
                    .create_data_pipeline(&token, workspace_id, &artifact.name, &content)
                    .await
            })
            .await?;
        }

        info!(workspace_id, "Investment Insights 数据管道就绪");
        Ok(())
    }
}
