//! Query execution against an analytical cluster over its REST API.
//!
//! Queries go to `/v1/rest/query`, control commands (leading `.`) to
//! `/v1/rest/mgmt`. The first table of the response is the primary result.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use common::errors::{AppError, AppResult};
use common::models::{ColumnInfo, QueryResult};
use common::utils::KqlCommandKind;

use crate::http::FabricHttp;

#[derive(Debug, Serialize)]
struct KustoRequest<'a> {
    db: &'a str,
    csl: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KustoResponse {
    #[serde(default)]
    tables: Vec<KustoTable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KustoTable {
    #[serde(default)]
    columns: Vec<KustoColumn>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KustoColumn {
    column_name: String,
    #[serde(default)]
    column_type: Option<String>,
    #[serde(default)]
    data_type: Option<String>,
}

impl From<KustoColumn> for ColumnInfo {
    fn from(column: KustoColumn) -> Self {
        Self {
            name: column.column_name,
            data_type: column
                .column_type
                .or(column.data_type)
                .unwrap_or_else(|| "dynamic".to_string()),
        }
    }
}

pub struct KustoClient {
    http: FabricHttp,
}

impl KustoClient {
    pub fn new(http: FabricHttp) -> Self {
        Self { http }
    }

    /// Runs `text` against `database` on the cluster at `cluster_uri`.
    ///
    /// Any failure is reported as an external service error; the caller sees
    /// a generic 500.
    pub async fn execute(
        &self,
        token: &str,
        cluster_uri: &str,
        database: &str,
        text: &str,
    ) -> AppResult<QueryResult> {
        let kind = KqlCommandKind::classify(text);
        let url = format!("{}{}", cluster_uri.trim_end_matches('/'), kind.rest_path());
        let started = Instant::now();

        let response = self
            .http
            .post_json(&url, token, &KustoRequest { db: database, csl: text })
            .await?;
        if !response.is_success() {
            tracing::error!(status = response.status, database, ?kind, "cluster rejected command");
            return Err(AppError::ExternalService(format!(
                "cluster returned {}: {}",
                response.status, response.body
            )));
        }

        let parsed: KustoResponse = response.json()?;
        let execution_time_ms = started.elapsed().as_millis() as u64;
        let result = match parsed.tables.into_iter().next() {
            Some(table) => QueryResult::new(
                table.columns.into_iter().map(ColumnInfo::from).collect(),
                table.rows,
                execution_time_ms,
            ),
            None => QueryResult {
                execution_time_ms,
                ..QueryResult::empty()
            },
        };

        tracing::info!(database, ?kind, rows = result.row_count, "command executed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::testing::ScriptedTransport;
    use crate::transport::{PlatformResponse, RequestBody};

    #[tokio::test]
    async fn test_control_command_goes_to_mgmt_endpoint() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            200,
            r#"{"Tables":[{"TableName":"Table_0",
                "Columns":[{"ColumnName":"TableName","DataType":"String","ColumnType":"string"},
                           {"ColumnName":"Rows","DataType":"Int64"}],
                "Rows":[["stocks",10],["trades",0]]}]}"#,
        )]));
        let client = KustoClient::new(FabricHttp::new(transport.clone()));

        let result = client
            .execute("t", "https://cluster.kusto.net/", "Investments", ".show tables details")
            .await
            .unwrap();

        assert_eq!(result.row_count, 2);
        assert_eq!(result.columns[0].data_type, "string");
        assert_eq!(result.columns[1].data_type, "Int64");
        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://cluster.kusto.net/v1/rest/mgmt");
        assert_eq!(
            request.body,
            RequestBody::Json(json!({"db": "Investments", "csl": ".show tables details"}))
        );
    }

    #[tokio::test]
    async fn test_query_goes_to_query_endpoint() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            200,
            r#"{"Tables":[]}"#,
        )]));
        let client = KustoClient::new(FabricHttp::new(transport.clone()));

        let result = client.execute("t", "https://c", "db", "stocks | take 1").await.unwrap();

        assert_eq!(result.row_count, 0);
        assert_eq!(transport.requests()[0].url, "https://c/v1/rest/query");
    }

    #[tokio::test]
    async fn test_cluster_failure_is_unexpected_error() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            400,
            r#"{"error":{"code":"BadRequest_SyntaxError"}}"#,
        )]));
        let client = KustoClient::new(FabricHttp::new(transport));

        let err = client.execute("t", "https://c", "db", "bad query(").await.unwrap_err();

        assert_eq!(err.status_code().as_u16(), 500);
        assert_eq!(err.to_envelope().error, "unexpected_error");
    }
}
