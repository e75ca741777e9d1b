//! OneLake file access over the DFS endpoint.
//!
//! Paths are `{workspaceId}/{itemId}/Files/{name}`. Writing a file takes three
//! calls: create (`PUT ?resource=file`), append at position 0 and flush at the
//! content length.

use reqwest::Method;

use common::errors::AppResult;

use crate::http::FabricApi;
use crate::transport::{PlatformRequest, RequestBody};

/// Path of a file in the `Files` folder of a lakehouse.
pub fn lakehouse_file_path(workspace_id: &str, lakehouse_id: &str, file_name: &str) -> String {
    format!("{workspace_id}/{lakehouse_id}/Files/{}", file_name.trim_start_matches('/'))
}

pub struct OneLakeClient {
    api: FabricApi,
}

impl OneLakeClient {
    pub fn new(api: FabricApi) -> Self {
        Self { api }
    }

    fn file_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api.endpoints.onelake_dfs_url,
            path.trim_start_matches('/')
        )
    }

    pub async fn file_exists(&self, token: &str, path: &str) -> AppResult<bool> {
        let response = self.api.http.head(&self.file_url(path), token).await?;
        match response.status {
            404 => Ok(false),
            _ => response.error_for_status().map(|_| true),
        }
    }

    /// Reads a file as text; `None` when it does not exist.
    pub async fn read_file(&self, token: &str, path: &str) -> AppResult<Option<String>> {
        let response = self.api.http.get(&self.file_url(path), token).await?;
        if response.status == 404 {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.body))
    }

    /// Creates or overwrites a file with `content`.
    pub async fn write_file(&self, token: &str, path: &str, content: &str) -> AppResult<()> {
        let url = self.file_url(path);
        let http = &self.api.http;

        http.send(PlatformRequest::new(Method::PUT, format!("{url}?resource=file")).token(token))
            .await?
            .error_for_status()?;

        let append = PlatformRequest::new(Method::PATCH, format!("{url}?action=append&position=0"))
            .token(token)
            .body(RequestBody::Text {
                content: content.to_string(),
                content_type: "application/octet-stream",
            });
        http.send(append).await?.error_for_status()?;

        let length = content.len();
        http.send(
            PlatformRequest::new(Method::PATCH, format!("{url}?action=flush&position={length}"))
                .token(token),
        )
        .await?
        .error_for_status()?;

        tracing::info!(path, bytes = length, "wrote OneLake file");
        Ok(())
    }

    /// Deletes a file; deleting a missing file is not an error.
    pub async fn delete_file(&self, token: &str, path: &str) -> AppResult<()> {
        let response = self
            .api
            .http
            .delete(&format!("{}?recursive=true", self.file_url(path)), token)
            .await?;
        match response.status {
            404 => Ok(()),
            _ => response.error_for_status().map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use common::config::{FabricEndpoints, LroPolicy};

    use crate::testing::FakeFabric;

    fn client(fake: &Arc<FakeFabric>) -> OneLakeClient {
        OneLakeClient::new(FabricApi::new(
            fake.clone(),
            FabricEndpoints::default(),
            LroPolicy::default(),
        ))
    }

    #[test]
    fn test_lakehouse_file_path() {
        assert_eq!(lakehouse_file_path("ws", "lh", "/a.json"), "ws/lh/Files/a.json");
    }

    #[tokio::test]
    async fn test_write_then_read_file() {
        let fake = Arc::new(FakeFabric::default());
        let onelake = client(&fake);
        let path = lakehouse_file_path("ws", "lh", "settings.json");

        assert!(!onelake.file_exists("t", &path).await.unwrap());
        onelake.write_file("t", &path, r#"{"apiKey":"k"}"#).await.unwrap();

        assert!(onelake.file_exists("t", &path).await.unwrap());
        assert_eq!(
            onelake.read_file("t", &path).await.unwrap().as_deref(),
            Some(r#"{"apiKey":"k"}"#)
        );
        let methods: Vec<String> = fake.requests().iter().map(|r| r.method.to_string()).collect();
        assert_eq!(methods, ["HEAD", "PUT", "PATCH", "PATCH", "HEAD", "GET"]);
        assert!(fake.requests()[3].url.ends_with("?action=flush&position=14"));
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none_and_deletes_quietly() {
        let fake = Arc::new(FakeFabric::default());
        let onelake = client(&fake);

        assert_eq!(onelake.read_file("t", "ws/lh/Files/x").await.unwrap(), None);
        onelake.delete_file("t", "ws/lh/Files/x").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let fake = Arc::new(FakeFabric::default());
        fake.seed_file("ws/lh/Files/job.txt", "42");
        let onelake = client(&fake);

        onelake.delete_file("t", "ws/lh/Files/job.txt").await.unwrap();

        assert_eq!(fake.file("ws/lh/Files/job.txt"), None);
    }
}
