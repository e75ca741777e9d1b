//! Lakehouse items.

use common::errors::AppResult;
use common::models::{CreateNamedItemRequest, Lakehouse};

use crate::http::FabricApi;
use crate::lro::LroPoller;

pub struct LakehouseClient {
    api: FabricApi,
}

impl LakehouseClient {
    pub fn new(api: FabricApi) -> Self {
        Self { api }
    }

    pub async fn list_lakehouses(&self, token: &str, workspace_id: &str) -> AppResult<Vec<Lakehouse>> {
        let url = self.api.workspace_url(workspace_id, "lakehouses");
        self.api.http.list_all(&url, token).await
    }

    /// Looks up a lakehouse by id or display name.
    pub async fn get_lakehouse(
        &self,
        token: &str,
        workspace_id: &str,
        id_or_name: &str,
    ) -> AppResult<Option<Lakehouse>> {
        let url = self.api.workspace_url(workspace_id, "lakehouses");
        self.api.http.find(&url, token, id_or_name).await
    }

    /// Reads a single lakehouse by id.
    pub async fn get_lakehouse_by_id(
        &self,
        token: &str,
        workspace_id: &str,
        lakehouse_id: &str,
    ) -> AppResult<Lakehouse> {
        let url = self
            .api
            .workspace_url(workspace_id, &format!("lakehouses/{lakehouse_id}"));
        self.api.http.get_json(&url, token).await
    }

    pub async fn create_lakehouse(
        &self,
        token: &str,
        workspace_id: &str,
        display_name: &str,
        description: Option<&str>,
    ) -> AppResult<Lakehouse> {
        let url = self.api.workspace_url(workspace_id, "lakehouses");
        let body = CreateNamedItemRequest {
            display_name: display_name.to_string(),
            description: description.map(str::to_string),
        };
        let response = self.api.http.post_json(&url, token, &body).await?.error_for_status()?;
        let lakehouse = LroPoller::new(&self.api.http, &self.api.lro)
            .wait_for_created(token, response, display_name, || {
                self.get_lakehouse(token, workspace_id, display_name)
            })
            .await?;
        tracing::info!(workspace_id, lakehouse_id = %lakehouse.id, display_name, "lakehouse created");
        Ok(lakehouse)
    }
}
