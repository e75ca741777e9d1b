//! 健康检查与工作负载默认值

use axum::{extract::State, Json};
use common::config::WorkloadConfig;
use common::response::HealthResponse;

use crate::state::AppState;

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        state.config.service_name.clone(),
        env!("CARGO_PKG_VERSION"),
    ))
}

/// 前端演示用的默认工作区、Eventhouse 与数据库 ID
#[utoipa::path(
    get,
    path = "/api/workload/defaults",
    tag = "health",
    responses(
        (status = 200, description = "工作负载名称与默认 ID", body = WorkloadConfig)
    )
)]
pub async fn workload_defaults(State(state): State<AppState>) -> Json<WorkloadConfig> {
    Json(state.workload.as_ref().clone())
}
