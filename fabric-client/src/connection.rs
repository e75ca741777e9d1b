//! Tenant level connections.

use common::errors::AppResult;
use common::models::Connection;

use crate::http::FabricApi;
use crate::lro::LroPoller;

pub struct ConnectionClient {
    api: FabricApi,
}

impl ConnectionClient {
    pub fn new(api: FabricApi) -> Self {
        Self { api }
    }

    fn connections_url(&self) -> String {
        self.api.endpoints.api_url("connections")
    }

    pub async fn list_connections(&self, token: &str) -> AppResult<Vec<Connection>> {
        self.api.http.list_all(&self.connections_url(), token).await
    }

    /// Looks up a connection by id or display name.
    pub async fn get_connection(&self, token: &str, id_or_name: &str) -> AppResult<Option<Connection>> {
        self.api.http.find(&self.connections_url(), token, id_or_name).await
    }

    /// Creates a connection from a raw JSON payload whose `displayName` is
    /// `display_name`.
    pub async fn create_connection(
        &self,
        token: &str,
        display_name: &str,
        payload: String,
    ) -> AppResult<Connection> {
        let response = self
            .api
            .http
            .post_raw_json(&self.connections_url(), token, payload)
            .await?
            .error_for_status()?;
        let connection = LroPoller::new(&self.api.http, &self.api.lro)
            .wait_for_created(token, response, display_name, || self.get_connection(token, display_name))
            .await?;
        tracing::info!(connection_id = %connection.id, display_name = %connection.display_name, "connection created");
        Ok(connection)
    }
}
