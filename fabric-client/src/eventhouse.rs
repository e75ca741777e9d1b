//! Eventhouse and KQL database items.

use common::errors::AppResult;
use common::models::{CreateKqlDatabaseRequest, CreateNamedItemRequest, Eventhouse, KqlDatabase};

use crate::http::FabricApi;
use crate::lro::LroPoller;

/// Eventhouse and KQL database operations of one workspace.
pub struct EventhouseClient {
    api: FabricApi,
}

impl EventhouseClient {
    pub fn new(api: FabricApi) -> Self {
        Self { api }
    }

    pub async fn list_eventhouses(&self, token: &str, workspace_id: &str) -> AppResult<Vec<Eventhouse>> {
        let url = self.api.workspace_url(workspace_id, "eventhouses");
        self.api.http.list_all(&url, token).await
    }

    /// Looks up an eventhouse by id or display name.
    pub async fn get_eventhouse(
        &self,
        token: &str,
        workspace_id: &str,
        id_or_name: &str,
    ) -> AppResult<Option<Eventhouse>> {
        let url = self.api.workspace_url(workspace_id, "eventhouses");
        self.api.http.find(&url, token, id_or_name).await
    }

    pub async fn create_eventhouse(
        &self,
        token: &str,
        workspace_id: &str,
        display_name: &str,
        description: Option<&str>,
    ) -> AppResult<Eventhouse> {
        let url = self.api.workspace_url(workspace_id, "eventhouses");
        let body = CreateNamedItemRequest {
            display_name: display_name.to_string(),
            description: description.map(str::to_string),
        };
        let response = self.api.http.post_json(&url, token, &body).await?.error_for_status()?;
        let eventhouse = LroPoller::new(&self.api.http, &self.api.lro)
            .wait_for_created(token, response, display_name, || {
                self.get_eventhouse(token, workspace_id, display_name)
            })
            .await?;
        tracing::info!(workspace_id, eventhouse_id = %eventhouse.id, display_name, "eventhouse created");
        Ok(eventhouse)
    }

    pub async fn list_kql_databases(&self, token: &str, workspace_id: &str) -> AppResult<Vec<KqlDatabase>> {
        let url = self.api.workspace_url(workspace_id, "kqlDatabases");
        self.api.http.list_all(&url, token).await
    }

    /// Looks up a KQL database by id or display name.
    pub async fn get_kql_database(
        &self,
        token: &str,
        workspace_id: &str,
        id_or_name: &str,
    ) -> AppResult<Option<KqlDatabase>> {
        let url = self.api.workspace_url(workspace_id, "kqlDatabases");
        self.api.http.find(&url, token, id_or_name).await
    }

    /// Creates a read-write KQL database under `eventhouse_id`.
    ///
    /// Creation is usually a long running operation; once it succeeds the
    /// database is re-read by display name.
    pub async fn create_kql_database(
        &self,
        token: &str,
        workspace_id: &str,
        eventhouse_id: &str,
        display_name: &str,
        description: Option<&str>,
    ) -> AppResult<KqlDatabase> {
        let url = self.api.workspace_url(workspace_id, "kqlDatabases");
        let body = CreateKqlDatabaseRequest::read_write(
            display_name,
            description.map(str::to_string),
            eventhouse_id,
        );
        let response = self.api.http.post_json(&url, token, &body).await?.error_for_status()?;
        let database = LroPoller::new(&self.api.http, &self.api.lro)
            .wait_for_created(token, response, display_name, || {
                self.get_kql_database(token, workspace_id, display_name)
            })
            .await?;
        tracing::info!(workspace_id, eventhouse_id, database_id = %database.id, display_name, "KQL database created");
        Ok(database)
    }
}
