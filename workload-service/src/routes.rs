//! 路由模块

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{eventhouse, health, investment, items, workload};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // 健康检查
        .route("/api/health", get(health::health_check))
        .route("/api/workload/defaults", get(health::workload_defaults))
        // Eventhouse 与 KQL 数据库
        .route("/{workspace_id}/eventhouses/create", post(eventhouse::create_eventhouse))
        .route("/{workspace_id}/eventhouses/{id_or_name}/get", get(eventhouse::get_eventhouse))
        .route(
            "/{workspace_id}/eventhouses/databases/{id_or_name}/get",
            get(eventhouse::get_kql_database),
        )
        .route(
            "/{workspace_id}/eventhouses/{eventhouse_id}/databases/create",
            post(eventhouse::create_kql_database),
        )
        .route(
            "/{workspace_id}/eventhouses/{eventhouse_id}/databases/{database_id}/query",
            get(eventhouse::query),
        )
        .route(
            "/{workspace_id}/eventhouses/{eventhouse_id}/databases/{database_id}/tables",
            get(eventhouse::tables),
        )
        // 工作负载设置
        .route("/{workspace_id}/workload/settings", get(workload::get_settings))
        .route(
            "/{workspace_id}/workload/settings/lakehouse",
            get(workload::get_settings_lakehouse),
        )
        .route(
            "/{workspace_id}/workload/settings/lakehouse/create",
            post(workload::create_settings_lakehouse),
        )
        // Investment Insights 编排
        .route(
            "/{workspace_id}/workload/investmentinsights/eventhouse/create",
            post(investment::create_eventhouse),
        )
        .route(
            "/{workspace_id}/workload/investmentinsights/pipeline/create",
            post(investment::create_pipeline),
        )
        .route(
            "/{workspace_id}/workload/investmentinsights/polygon/validate",
            post(investment::validate_polygon_key),
        )
        // 条目生命周期
        .route(
            "/{workspace_id}/items/{item_type}/{item_id}",
            get(items::get_item_payload)
                .post(items::create_item)
                .patch(items::update_item),
        )
        .route(
            "/{workspace_id}/items/{item_type}/{item_id}/jobs/{job_type}/instances/{job_instance_id}",
            get(items::get_job_state),
        )
}
