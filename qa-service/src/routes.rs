//! 路由模块

use axum::{
    routing::{get, post},
    Router,
};
use crate::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index).post(handlers::execute))
        .route("/api/ask", post(handlers::ask))
        .route("/api/examples", get(handlers::examples))
        .route("/api/health", get(handlers::health_check))
}
