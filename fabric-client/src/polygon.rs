//! Polygon.io API key validation.

use common::errors::AppResult;

use crate::http::FabricHttp;

pub struct PolygonClient {
    http: FabricHttp,
    validation_url: String,
}

impl PolygonClient {
    pub fn new(http: FabricHttp, validation_url: impl Into<String>) -> Self {
        Self {
            http,
            validation_url: validation_url.into(),
        }
    }

    /// A key is valid when a market data request made with it answers 200.
    pub async fn validate_api_key(&self, api_key: &str) -> AppResult<bool> {
        let response = self.http.get(&self.validation_url, api_key).await?;
        let valid = response.status == 200;
        if !valid {
            tracing::info!(status = response.status, "Polygon.io rejected API key");
        }
        Ok(valid)
    }
}
