//! Eventhouse 与 KQL 数据库服务

use common::errors::{AppError, AppResult};
use common::models::{Eventhouse, ItemCreateRequest, KqlDatabase, QueryParams, QueryResult};
use common::utils::kql::SHOW_TABLES;
use fabric_client::{EventhouseClient, KustoClient};
use tracing::info;

use super::Session;

pub struct EventhouseService<'a> {
    session: &'a Session<'a>,
    client: EventhouseClient,
}

impl<'a> EventhouseService<'a> {
    pub fn new(session: &'a Session<'a>) -> Self {
        Self {
            session,
            client: EventhouseClient::new(session.api.clone()),
        }
    }

    pub async fn get_eventhouse(&self, workspace_id: &str, id_or_name: &str) -> AppResult<Option<Eventhouse>> {
        let token = self.session.fabric_token().await?;
        self.client.get_eventhouse(&token, workspace_id, id_or_name).await
    }

    pub async fn create_eventhouse(&self, workspace_id: &str, req: &ItemCreateRequest) -> AppResult<Eventhouse> {
        let token = self.session.fabric_token().await?;
        self.client
            .create_eventhouse(&token, workspace_id, &req.display_name, req.description.as_deref())
            .await
    }

    pub async fn get_kql_database(&self, workspace_id: &str, id_or_name: &str) -> AppResult<Option<KqlDatabase>> {
        let token = self.session.fabric_token().await?;
        self.client.get_kql_database(&token, workspace_id, id_or_name).await
    }

    pub async fn create_kql_database(
        &self,
        workspace_id: &str,
        eventhouse_id: &str,
        req: &ItemCreateRequest,
    ) -> AppResult<KqlDatabase> {
        let token = self.session.fabric_token().await?;
        self.client
            .create_kql_database(
                &token,
                workspace_id,
                eventhouse_id,
                &req.display_name,
                req.description.as_deref(),
            )
            .await
    }

    /// 执行 KQL 查询；未给出数据库名或集群地址时按数据库 ID 查出补全
    pub async fn query(&self, workspace_id: &str, database_id: &str, params: &QueryParams) -> AppResult<QueryResult> {
        let given = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let (database, cluster) = match (given(&params.database_name), given(&params.connection_string)) {
            (Some(database), Some(cluster)) => (database, cluster),
            _ => self.resolve_target(workspace_id, database_id).await?,
        };
        self.execute(&cluster, &database, &params.query).await
    }

    /// 列出数据库中的表及行数
    pub async fn tables(&self, workspace_id: &str, database_id: &str) -> AppResult<QueryResult> {
        let (database, cluster) = self.resolve_target(workspace_id, database_id).await?;
        self.execute(&cluster, &database, SHOW_TABLES).await
    }

    /// 数据库的显示名与查询服务地址
    async fn resolve_target(&self, workspace_id: &str, database_id: &str) -> AppResult<(String, String)> {
        let database = self
            .get_kql_database(workspace_id, database_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("KQL database {database_id}")))?;
        let cluster = database
            .query_service_uri()
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::ExternalService(format!("KQL database {} has no query service URI", database.id))
            })?;
        Ok((database.display_name, cluster))
    }

    async fn execute(&self, cluster: &str, database: &str, text: &str) -> AppResult<QueryResult> {
        let token = self.session.cluster_token(cluster).await?;
        info!(database, "执行 KQL");
        KustoClient::new(self.session.api.http.clone())
            .execute(&token, cluster, database, text)
            .await
    }
}
