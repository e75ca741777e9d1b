//! Fabric 工作负载后端服务
//!
//! 代表已认证用户调用 Fabric 平台 REST API，包括：
//! - Eventhouse / KQL 数据库的查询与创建，以及 KQL 查询执行
//! - 工作负载设置 Lakehouse 的读取与创建
//! - Investment Insights 资源编排（Eventhouse、DDL、样例数据、连接、数据管道）
//! - 条目元数据生命周期与任务状态

mod handlers;
mod routes;
mod service;
mod state;


use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "workload-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fabric 工作负载后端 API",
        version = "0.1.0",
        description = "Eventhouse/Lakehouse 代理与 Investment Insights 资源编排"
    ),
    paths(
        handlers::eventhouse::get_eventhouse,
        handlers::eventhouse::create_eventhouse,
        handlers::eventhouse::get_kql_database,
        handlers::eventhouse::create_kql_database,
        handlers::eventhouse::query,
        handlers::eventhouse::tables,
        handlers::workload::get_settings,
        handlers::workload::get_settings_lakehouse,
        handlers::workload::create_settings_lakehouse,
        handlers::investment::create_eventhouse,
        handlers::investment::create_pipeline,
        handlers::investment::validate_polygon_key,
        handlers::items::create_item,
        handlers::items::update_item,
        handlers::items::get_item_payload,
        handlers::items::get_job_state,
        handlers::health::health_check,
        handlers::health::workload_defaults,
    ),
    components(schemas(
        common::models::Eventhouse,
        common::models::KqlDatabase,
        common::models::Lakehouse,
        common::models::ItemCreateRequest,
        common::models::ApiKeyRequest,
        common::models::QueryResult,
        common::models::ColumnInfo,
        common::models::ItemPayloadIn,
        common::models::ItemPayloadOut,
        common::models::JobInstanceState,
        common::response::ErrorEnvelope,
        common::response::HealthResponse,
        common::config::WorkloadConfig,
        handlers::items::CreateItemBody,
        handlers::items::UpdateItemBody,
        handlers::investment::ValidationSuccess,
    )),
    tags(
        (name = "eventhouse", description = "Eventhouse 与 KQL 数据库端点"),
        (name = "workload", description = "工作负载设置端点"),
        (name = "investment-insights", description = "Investment Insights 编排端点"),
        (name = "items", description = "条目生命周期端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 读取 .env（已存在的环境变量优先）
    load_dotenv();

    // 初始化日志追踪，LOG_FORMAT=json 时输出 JSON
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (plain_layer, json_layer) = if json_logs {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(plain_layer)
        .with(json_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置并创建应用状态
    let config = AppConfig::load_with_service(SERVICE_NAME);
    let state = AppState::new(config.clone()).context("初始化应用状态失败")?;
    info!(
        workload = %state.workload.workload_name,
        api = %state.api.endpoints.api_base_url,
        "配置加载完成"
    );

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {addr}"))?;
    axum::serve(listener, app).await.context("服务启动失败")?;
    Ok(())
}

pub(crate) fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
