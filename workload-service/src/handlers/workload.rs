//! 工作负载设置端点

use axum::{
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use common::errors::AppResult;
use common::middleware::{AuthorizationContext, RequestId};
use common::models::Lakehouse;
use common::response::Lookup;

use crate::service::provisioning::{Provisioner, WorkloadSettings};
use crate::service::Session;
use crate::state::AppState;

/// 读取设置文件原文
#[utoipa::path(
    get,
    path = "/{workspace_id}/workload/settings",
    tag = "workload",
    params(("workspace_id" = String, Path, description = "工作区 ID")),
    responses(
        (status = 200, description = "设置文件原文；缺少 Lakehouse 时为 {\"hasWorkloadSettingsLakehouse\":false}，缺少文件时为 {\"hasWorkloadSettingsJSON\":false}")
    )
)]
pub async fn get_settings(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path(workspace_id): Path<String>,
) -> AppResult<Response> {
    auth.require_any(&state.scopes.write_workspace)?;
    let session = Session::new(&state, &auth, &request_id);
    let settings = Provisioner::new(&session).read_settings(&workspace_id).await?;

    Ok(match settings {
        WorkloadSettings::NoLakehouse => Json(json!({ "hasWorkloadSettingsLakehouse": false })).into_response(),
        WorkloadSettings::NoSettingsFile => Json(json!({ "hasWorkloadSettingsJSON": false })).into_response(),
        WorkloadSettings::Content(text) => ([(CONTENT_TYPE, "application/json")], text).into_response(),
    })
}

/// 获取设置 Lakehouse
#[utoipa::path(
    get,
    path = "/{workspace_id}/workload/settings/lakehouse",
    tag = "workload",
    params(("workspace_id" = String, Path, description = "工作区 ID")),
    responses(
        (status = 200, description = "Lakehouse；不存在时为 {\"error\":\"does_not_exist\"}", body = Lakehouse)
    )
)]
pub async fn get_settings_lakehouse(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path(workspace_id): Path<String>,
) -> AppResult<Lookup<Lakehouse>> {
    auth.require_any(&state.scopes.write_workspace)?;
    let session = Session::new(&state, &auth, &request_id);
    let token = session.fabric_token().await?;
    let lakehouse = Provisioner::new(&session)
        .settings_lakehouse(&token, &workspace_id)
        .await?;
    Ok(lakehouse.into())
}

/// 创建设置 Lakehouse（已存在则复用）并上传样例数据
#[utoipa::path(
    post,
    path = "/{workspace_id}/workload/settings/lakehouse/create",
    tag = "workload",
    params(("workspace_id" = String, Path, description = "工作区 ID")),
    responses(
        (status = 200, description = "设置 Lakehouse", body = Lakehouse),
        (status = 400, description = "平台拒绝请求"),
        (status = 500, description = "意外错误")
    )
)]
pub async fn create_settings_lakehouse(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path(workspace_id): Path<String>,
) -> AppResult<Json<Lakehouse>> {
    auth.require_any(&state.scopes.write_workspace)?;
    let session = Session::new(&state, &auth, &request_id);
    let lakehouse = Provisioner::new(&session)
        .ensure_settings_lakehouse(&workspace_id)
        .await?;
    Ok(Json(lakehouse))
}
