//! Data pipeline items.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use common::errors::AppResult;
use common::models::{CreateItemRequest, DataPipeline, DefinitionPart, ItemDefinition};

use crate::http::FabricApi;
use crate::lro::LroPoller;

/// Name of the definition part holding the pipeline JSON.
pub const PIPELINE_CONTENT_PART: &str = "pipeline-content.json";

pub struct DataPipelineClient {
    api: FabricApi,
}

impl DataPipelineClient {
    pub fn new(api: FabricApi) -> Self {
        Self { api }
    }

    pub async fn list_data_pipelines(&self, token: &str, workspace_id: &str) -> AppResult<Vec<DataPipeline>> {
        let url = self.api.workspace_url(workspace_id, "dataPipelines");
        self.api.http.list_all(&url, token).await
    }

    pub async fn get_data_pipeline(
        &self,
        token: &str,
        workspace_id: &str,
        id_or_name: &str,
    ) -> AppResult<Option<DataPipeline>> {
        let url = self.api.workspace_url(workspace_id, "dataPipelines");
        self.api.http.find(&url, token, id_or_name).await
    }

    /// Creates a pipeline through the generic items endpoint with its
    /// definition inlined as one base64 part.
    pub async fn create_data_pipeline(
        &self,
        token: &str,
        workspace_id: &str,
        display_name: &str,
        pipeline_content: &str,
    ) -> AppResult<DataPipeline> {
        let url = self.api.workspace_url(workspace_id, "items");
        let body = pipeline_create_request(display_name, pipeline_content);
        let response = self.api.http.post_json(&url, token, &body).await?.error_for_status()?;
        let pipeline = LroPoller::new(&self.api.http, &self.api.lro)
            .wait_for_created(token, response, display_name, || {
                self.get_data_pipeline(token, workspace_id, display_name)
            })
            .await?;
        tracing::info!(workspace_id, pipeline_id = %pipeline.id, display_name, "data pipeline created");
        Ok(pipeline)
    }
}

/// Body of `POST /workspaces/{ws}/items` for a data pipeline.
pub fn pipeline_create_request(display_name: &str, pipeline_content: &str) -> CreateItemRequest {
    CreateItemRequest {
        display_name: display_name.to_string(),
        item_type: "DataPipeline".to_string(),
        description: None,
        definition: Some(ItemDefinition {
            parts: vec![DefinitionPart::inline_base64(
                PIPELINE_CONTENT_PART,
                STANDARD.encode(pipeline_content.as_bytes()),
            )],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pipeline_definition_is_one_inline_base64_part() {
        let body = serde_json::to_value(pipeline_create_request("Historical Stock Ingestion", "{}")).unwrap();
        assert_eq!(
            body,
            json!({
                "displayName": "Historical Stock Ingestion",
                "type": "DataPipeline",
                "definition": {
                    "parts": [{
                        "path": "pipeline-content.json",
                        "payload": "e30=",
                        "payloadType": "InlineBase64"
                    }]
                }
            })
        );
    }
}
