//! Handler模块

use std::time::Instant;

use axum::{
    extract::State,
    response::Html,
    Extension, Form, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::extract::ApiJson;
use common::middleware::RequestId;
use common::models::question::{AskOutcome, AskRequest, EXAMPLE_QUESTIONS};
use common::response::ApiResponse;
use crate::page::Page;
use crate::pool_manager::PoolStats;
use crate::state::AppState;

/// 问答页面
#[utoipa::path(
    get,
    path = "/",
    tag = "page",
    responses(
        (status = 200, description = "问答页面", body = String, content_type = "text/html")
    )
)]
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(Page::new(&state.config.title).to_string())
}

/// 表单提交：执行问答流程并返回页面
#[utoipa::path(
    post,
    path = "/",
    tag = "page",
    request_body(content = AskRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "带结果的问答页面", body = String, content_type = "text/html")
    )
)]
pub async fn execute(
    State(state): State<AppState>,
    Form(req): Form<AskRequest>,
) -> Html<String> {
    let question = req.question.clone();
    let outcome = state.qa.ask(req).await;
    Html(
        Page::new(&state.config.title)
            .with_outcome(&question, &outcome)
            .to_string(),
    )
}

/// 自然语言问答（JSON）
#[utoipa::path(
    post,
    path = "/api/ask",
    tag = "qa",
    request_body = AskRequest,
    responses(
        (status = 200, description = "问答结果，阶段错误包含在结果中", body = ApiResponse<AskOutcome>),
        (status = 400, description = "请求体无效，返回 VALIDATION_ERROR")
    )
)]
pub async fn ask(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(req): ApiJson<AskRequest>,
) -> Result<Json<ApiResponse<AskOutcome>>, AppError> {
    let start = Instant::now();
    let outcome = state.qa.ask(req).await;
    Ok(Json(
        ApiResponse::ok_with_service(outcome, state.config.service_name.clone())
            .with_request_id(request_id.as_str())
            .with_duration(start.elapsed().as_millis() as u64),
    ))
}

/// 示例问题
#[utoipa::path(
    get,
    path = "/api/examples",
    tag = "qa",
    responses(
        (status = 200, description = "侧边栏示例问题", body = ApiResponse<Vec<String>>)
    )
)]
pub async fn examples(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    let data = EXAMPLE_QUESTIONS.iter().map(|q| q.to_string()).collect();
    Json(ApiResponse::ok_with_service(data, state.config.service_name.clone()))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务状态与连接池状态", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = match state.pool_manager.probe().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database probe failed");
            false
        }
    };
    Json(HealthResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database: state.pool_manager.db_type().to_string(),
        pool: state.pool_manager.stats(),
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub database: String,
    pub pool: PoolStats,
}
