//! HTTP 服务 - 编排层
//!
//! | 方法 | 路径 | 说明 |
//! |------|------|------|
//! | `POST` | `/query` | 执行一次查询，返回 `ResponseEnvelope` |
//! | `GET`  | `/stats` | 模型诊断信息 |
//! | `GET`  | `/health` | 健康检查 |
//!
//! 查询失败同样返回 200，失败原因在 `success` / `error` 字段里；
//! 只有请求体本身不合法时才会返回 4xx。

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{ModelStats, QueryRequest, ResponseEnvelope};
use crate::workflow::QueryFlow;

/// 所有 handler 共享的状态
#[derive(Clone)]
pub struct AppState {
    flow: Arc<QueryFlow>,
}

impl AppState {
    pub fn new(flow: Arc<QueryFlow>) -> Self {
        Self { flow }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_accuracy: f64,
}

/// 构建路由（允许任意来源跨域）
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(handle_query))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// 绑定地址并一直运行
pub async fn serve(bind_addr: &str, flow: Arc<QueryFlow>) -> AppResult<()> {
    let app = router(AppState::new(flow));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(AppError::Server)?;
    info!("🌐 HTTP 服务监听 http://{}", bind_addr);
    axum::serve(listener, app).await.map_err(AppError::Server)
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Json<ResponseEnvelope> {
    Json(state.flow.run(&request.query).await)
}

async fn handle_stats(State(state): State<AppState>) -> Json<ModelStats> {
    Json(state.flow.predictor().stats().clone())
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_accuracy: state.flow.predictor().accuracy(),
    })
}
