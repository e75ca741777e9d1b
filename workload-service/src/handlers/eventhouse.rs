//! Eventhouse 与 KQL 数据库端点

use axum::{
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use common::errors::AppResult;
use common::middleware::{AuthorizationContext, RequestId};
use common::models::{Eventhouse, ItemCreateRequest, KqlDatabase, QueryParams, QueryResult};
use common::response::Lookup;

use crate::service::eventhouse::EventhouseService;
use crate::service::Session;
use crate::state::AppState;

/// 按 ID 或名称获取 Eventhouse
#[utoipa::path(
    get,
    path = "/{workspace_id}/eventhouses/{id_or_name}/get",
    tag = "eventhouse",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("id_or_name" = String, Path, description = "Eventhouse ID 或显示名称")
    ),
    responses(
        (status = 200, description = "Eventhouse；不存在时为 {\"error\":\"does_not_exist\"}", body = Eventhouse),
        (status = 401, description = "缺少或无法解析的令牌"),
        (status = 403, description = "令牌不含所需权限")
    )
)]
pub async fn get_eventhouse(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, id_or_name)): Path<(String, String)>,
) -> AppResult<Lookup<Eventhouse>> {
    auth.require_any(&state.scopes.write_eventhouse)?;
    let session = Session::new(&state, &auth, &request_id);
    let eventhouse = EventhouseService::new(&session)
        .get_eventhouse(&workspace_id, &id_or_name)
        .await?;
    Ok(eventhouse.into())
}

/// 创建 Eventhouse
#[utoipa::path(
    post,
    path = "/{workspace_id}/eventhouses/create",
    tag = "eventhouse",
    params(("workspace_id" = String, Path, description = "工作区 ID")),
    request_body = ItemCreateRequest,
    responses(
        (status = 200, description = "创建成功", body = Eventhouse),
        (status = 400, description = "参数校验失败或平台拒绝请求"),
        (status = 500, description = "意外错误")
    )
)]
pub async fn create_eventhouse(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path(workspace_id): Path<String>,
    Json(req): Json<ItemCreateRequest>,
) -> AppResult<Json<Eventhouse>> {
    auth.require_any(&state.scopes.write_eventhouse)?;
    req.validate()?;
    let session = Session::new(&state, &auth, &request_id);
    let eventhouse = EventhouseService::new(&session)
        .create_eventhouse(&workspace_id, &req)
        .await?;
    Ok(Json(eventhouse))
}

/// 按 ID 或名称获取 KQL 数据库
#[utoipa::path(
    get,
    path = "/{workspace_id}/eventhouses/databases/{id_or_name}/get",
    tag = "eventhouse",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("id_or_name" = String, Path, description = "数据库 ID 或显示名称")
    ),
    responses(
        (status = 200, description = "KQL 数据库；不存在时为 {\"error\":\"does_not_exist\"}", body = KqlDatabase)
    )
)]
pub async fn get_kql_database(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, id_or_name)): Path<(String, String)>,
) -> AppResult<Lookup<KqlDatabase>> {
    auth.require_any(&state.scopes.write_eventhouse)?;
    let session = Session::new(&state, &auth, &request_id);
    let database = EventhouseService::new(&session)
        .get_kql_database(&workspace_id, &id_or_name)
        .await?;
    Ok(database.into())
}

/// 在 Eventhouse 下创建 KQL 数据库
#[utoipa::path(
    post,
    path = "/{workspace_id}/eventhouses/{eventhouse_id}/databases/create",
    tag = "eventhouse",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("eventhouse_id" = String, Path, description = "父 Eventhouse ID")
    ),
    request_body = ItemCreateRequest,
    responses(
        (status = 200, description = "创建成功", body = KqlDatabase),
        (status = 400, description = "参数校验失败或平台拒绝请求"),
        (status = 500, description = "长任务失败或超时")
    )
)]
pub async fn create_kql_database(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, eventhouse_id)): Path<(String, String)>,
    Json(req): Json<ItemCreateRequest>,
) -> AppResult<Json<KqlDatabase>> {
    auth.require_any(&state.scopes.write_eventhouse)?;
    req.validate()?;
    let session = Session::new(&state, &auth, &request_id);
    let database = EventhouseService::new(&session)
        .create_kql_database(&workspace_id, &eventhouse_id, &req)
        .await?;
    Ok(Json(database))
}

/// 在 KQL 数据库上执行查询或控制命令
#[utoipa::path(
    get,
    path = "/{workspace_id}/eventhouses/{eventhouse_id}/databases/{database_id}/query",
    tag = "eventhouse",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("eventhouse_id" = String, Path, description = "Eventhouse ID"),
        ("database_id" = String, Path, description = "KQL 数据库 ID"),
        QueryParams
    ),
    responses(
        (status = 200, description = "查询结果", body = QueryResult),
        (status = 500, description = "查询失败")
    )
)]
pub async fn query(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, _eventhouse_id, database_id)): Path<(String, String, String)>,
    Query(params): Query<QueryParams>,
) -> AppResult<Json<QueryResult>> {
    auth.require_any(&state.scopes.write_eventhouse)?;
    params.validate()?;
    let session = Session::new(&state, &auth, &request_id);
    let result = EventhouseService::new(&session)
        .query(&workspace_id, &database_id, &params)
        .await?;
    Ok(Json(result))
}

/// 列出 KQL 数据库中的表
#[utoipa::path(
    get,
    path = "/{workspace_id}/eventhouses/{eventhouse_id}/databases/{database_id}/tables",
    tag = "eventhouse",
    params(
        ("workspace_id" = String, Path, description = "工作区 ID"),
        ("eventhouse_id" = String, Path, description = "Eventhouse ID"),
        ("database_id" = String, Path, description = "KQL 数据库 ID")
    ),
    responses(
        (status = 200, description = "表名与行数", body = QueryResult),
        (status = 500, description = "查询失败")
    )
)]
pub async fn tables(
    State(state): State<AppState>,
    request_id: RequestId,
    auth: AuthorizationContext,
    Path((workspace_id, _eventhouse_id, database_id)): Path<(String, String, String)>,
) -> AppResult<Json<QueryResult>> {
    auth.require_any(&state.scopes.write_eventhouse)?;
    let session = Session::new(&state, &auth, &request_id);
    let result = EventhouseService::new(&session)
        .tables(&workspace_id, &database_id)
        .await?;
    Ok(Json(result))
}
