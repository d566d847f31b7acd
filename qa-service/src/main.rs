//! 零售销售问答服务
//!
//! 提供自然语言问答功能，包括：
//! - 读取销售库表结构与样例数据
//! - 调用大模型生成 SQL 并清洗
//! - 执行查询并以表格/柱状图展示结果

mod executor;
mod generator;
mod handlers;
mod page;
mod pool_manager;
mod render;
mod routes;
mod schema;
mod service;
mod state;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "qa-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "零售销售问答 API",
        version = "0.1.0",
        description = "自然语言转 SQL 问答服务"
    ),
    paths(
        handlers::index,
        handlers::execute,
        handlers::ask,
        handlers::examples,
        handlers::health_check,
    ),
    components(schemas(
        common::models::AskRequest,
        common::models::AskOutcome,
        common::models::Answer,
        common::models::StageError,
        common::models::PipelineStage,
        common::models::QueryResult,
        common::models::ColumnInfo,
        common::models::BarChart,
        common::models::Bar,
        handlers::HealthResponse,
        pool_manager::PoolStats,
    )),
    tags(
        (name = "page", description = "页面端点"),
        (name = "qa", description = "问答端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 需在读取任何配置之前加载
    load_dotenv();
    init_tracing();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME).context("加载配置失败")?;

    // 连接销售库；连不上就不提供页面
    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to connect to the database");
            return Err(e.into());
        }
    };

    // 创建路由
    let pool_manager = state.pool_manager.clone();
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_address();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    pool_manager.close().await;
    info!("Database pool closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn create_router(state: AppState) -> Router {
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
