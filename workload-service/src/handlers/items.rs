//! 条目生命周期端点

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use common::errors::AppResult;
use common::middleware::{AuthorizationContext, RequestId};
use common::models::{ItemPayloadIn, ItemPayloadOut, JobInstanceState};

use crate::service::items::ItemService;
use crate::service::Session;
use crate::state::AppState;

/// 宿主创建条目时发送的请求体
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemBody {
    #[serde(default)]
    pub creation_payload: Option<ItemPayloadIn>,
}

/// 宿主更新条目时发送的请求体
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemBody {
    #[serde(default)]
    pub update_payload: Option<ItemPayloadIn>,
}

/// 创建条目
#[utoipa::path(
    post,
    path = "/{workspace_id}/items/{item_type}/{item_id}",
    tag = "items",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("item_type" = String, Path, description = "完整条目类型，如 Org.WorkloadSample.InvestmentInsights"),
        ("item_id" = String, Path, description = "条目 ID")
    ),
    request_body = CreateItemBody,
    responses(
        (status = 200, description = "已创建"),
        (status = 400, description = "负载无效或条目类型不支持")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, item_type, item_id)): Path<(String, String, String)>,
    Json(body): Json<CreateItemBody>,
) -> AppResult<StatusCode> {
    auth.require_any(&state.scopes.item_write)?;
    let session = Session::new(&state, &auth, &request_id);
    ItemService::new(&session)
        .create(&workspace_id, &item_type, &item_id, body.creation_payload)
        .await?;
    Ok(StatusCode::OK)
}

/// 更新条目
#[utoipa::path(
    patch,
    path = "/{workspace_id}/items/{item_type}/{item_id}",
    tag = "items",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("item_type" = String, Path, description = "完整条目类型"),
        ("item_id" = String, Path, description = "条目 ID")
    ),
    request_body = UpdateItemBody,
    responses(
        (status = 200, description = "已更新"),
        (status = 400, description = "负载无效"),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, item_type, item_id)): Path<(String, String, String)>,
    Json(body): Json<UpdateItemBody>,
) -> AppResult<StatusCode> {
    auth.require_any(&state.scopes.item_write)?;
    let session = Session::new(&state, &auth, &request_id);
    ItemService::new(&session)
        .update(&workspace_id, &item_type, &item_id, body.update_payload)
        .await?;
    Ok(StatusCode::OK)
}

/// 读取条目元数据，Lakehouse 引用解析为完整对象
#[utoipa::path(
    get,
    path = "/{workspace_id}/items/{item_type}/{item_id}",
    tag = "items",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("item_type" = String, Path, description = "完整条目类型"),
        ("item_id" = String, Path, description = "条目 ID")
    ),
    responses(
        (status = 200, description = "条目元数据", body = ItemPayloadOut),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn get_item_payload(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, item_type, item_id)): Path<(String, String, String)>,
) -> AppResult<Json<ItemPayloadOut>> {
    auth.require_any(&state.scopes.item_read)?;
    let session = Session::new(&state, &auth, &request_id);
    let payload = ItemService::new(&session)
        .payload(&workspace_id, &item_type, &item_id)
        .await?;
    Ok(Json(payload))
}

/// 查询任务实例状态
#[utoipa::path(
    get,
    path = "/{workspace_id}/items/{item_type}/{item_id}/jobs/{job_type}/instances/{job_instance_id}",
    tag = "items",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("item_type" = String, Path, description = "完整条目类型"),
        ("item_id" = String, Path, description = "条目 ID"),
        ("job_type" = String, Path, description = "任务类型，如 Org.WorkloadSample.SampleWorkloadItem.CalculateAsText"),
        ("job_instance_id" = String, Path, description = "任务实例 ID")
    ),
    responses(
        (status = 200, description = "任务状态", body = JobInstanceState),
        (status = 400, description = "任务类型不支持"),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn get_job_state(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, item_type, item_id, job_type, job_instance_id)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
) -> AppResult<Json<JobInstanceState>> {
    auth.require_any(&state.scopes.item_read)?;
    let session = Session::new(&state, &auth, &request_id);
    let job_state = ItemService::new(&session)
        .job_state(&workspace_id, &item_type, &item_id, &job_type, &job_instance_id)
        .await?;
    Ok(Json(job_state))
}
