//! Investment Insights 编排端点

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::AppResult;
use common::middleware::{AuthorizationContext, RequestId};
use common::models::{ApiKeyRequest, KqlDatabase};
use common::response::ErrorEnvelope;
use fabric_client::PolygonClient;

use crate::service::provisioning::Provisioner;
use crate::service::Session;
use crate::state::AppState;

/// API Key 校验通过时的返回
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationSuccess {
    pub result: String,
}

/// 创建 Investments Eventhouse 与 KQL 数据库，执行 DDL 并导入样例数据
#[utoipa::path(
    post,
    path = "/{workspace_id}/workload/investmentinsights/eventhouse/create",
    tag = "investment-insights",
    params(("workspace_id" = String, Path, description = "工作区 ID")),
    responses(
        (status = 200, description = "KQL 数据库", body = KqlDatabase),
        (status = 400, description = "平台拒绝请求"),
        (status = 404, description = "设置 Lakehouse 不存在", body = ErrorEnvelope),
        (status = 500, description = "DDL 或导入失败")
    )
)]
pub async fn create_eventhouse(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path(workspace_id): Path<String>,
) -> AppResult<Json<KqlDatabase>> {
    auth.require_any(&state.scopes.write_eventhouse)?;
    let session = Session::new(&state, &auth, &request_id);
    let database = Provisioner::new(&session)
        .provision_eventhouse(&workspace_id)
        .await?;
    Ok(Json(database))
}

/// 创建 Polygon.io 连接与数据管道
#[utoipa::path(
    post,
    path = "/{workspace_id}/workload/investmentinsights/pipeline/create",
    tag = "investment-insights",
    params(("workspace_id" = String, Path, description = "工作区 ID")),
    request_body = ApiKeyRequest,
    responses(
        (status = 200, description = "连接与管道已就绪"),
        (status = 400, description = "参数校验失败或平台拒绝请求"),
        (status = 404, description = "KQL 数据库不存在", body = ErrorEnvelope)
    )
)]
pub async fn create_pipeline(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path(workspace_id): Path<String>,
    Json(req): Json<ApiKeyRequest>,
) -> AppResult<StatusCode> {
    auth.require_any(&state.scopes.write_pipeline)?;
    req.validate()?;
    let session = Session::new(&state, &auth, &request_id);
    Provisioner::new(&session)
        .provision_pipelines(&workspace_id, &req.api_key)
        .await?;
    Ok(StatusCode::OK)
}

/// 校验 Polygon.io API Key，无需授权
#[utoipa::path(
    post,
    path = "/{workspace_id}/workload/investmentinsights/polygon/validate",
    tag = "investment-insights",
    params(("workspace_id" = String, Path, description = "工作区 ID")),
    request_body = ApiKeyRequest,
    responses(
        (status = 200, description = "API Key 有效", body = ValidationSuccess),
        (status = 400, description = "API Key 无效", body = ErrorEnvelope)
    )
)]
pub async fn validate_polygon_key(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(_workspace_id): Path<String>,
    Json(req): Json<ApiKeyRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let api = state.api.for_request(request_id.as_str());
    let polygon = PolygonClient::new(api.http.clone(), api.endpoints.polygon_validation_url.clone());

    if polygon.validate_api_key(&req.api_key).await? {
        Ok(Json(ValidationSuccess {
            result: "success".to_string(),
        })
        .into_response())
    } else {
        Ok((StatusCode::BAD_REQUEST, Json(ErrorEnvelope::code("invalid_api_key"))).into_response())
    }
}
