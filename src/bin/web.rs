//! behavior-web：HTTP 工具服务
//!
//! 启动: cargo run --bin behavior-web --features web
//! GET /api/tools 列出工具，POST /api/tools/:name 以 JSON body 作为参数调用工具。

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use behavior_pipeline::config::load_config;
use behavior_pipeline::observability;
use behavior_pipeline::tools::{ToolError, ToolExecutor, ToolInfo};
use behavior_pipeline::PipelineBuilder;
use serde_json::Value;

struct AppState {
    executor: ToolExecutor,
}

fn status_for(e: &ToolError) -> StatusCode {
    match e.code() {
        "invalid_arguments" | "validation" => StatusCode::BAD_REQUEST,
        "unknown_tool" => StatusCode::NOT_FOUND,
        "concurrency_conflict" => StatusCode::CONFLICT,
        "timeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn app(executor: ToolExecutor) -> Router {
    let state = Arc::new(AppState { executor });
    Router::new()
        .route("/api/tools", get(api_tools_list))
        .route("/api/tools/:name", post(api_tool_call))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state)
}

async fn api_tools_list(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    Json(state.executor.describe())
}

/// POST /api/tools/:name：body 为工具参数（可省略）
async fn api_tool_call(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let args = body.map(|Json(v)| v).unwrap_or(Value::Null);
    state.executor.execute(&name, args).await.map(Json).map_err(|e| {
        (
            status_for(&e),
            Json(serde_json::json!({"code": e.code(), "message": e.to_string()})),
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let bind = std::env::var("BEHAVIOR_WEB_BIND").unwrap_or_else(|_| cfg.server.http_bind.clone());
    let components = PipelineBuilder::new(cfg).build();

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("behavior-web listening on http://{}", bind);
    axum::serve(listener, app(components.executor)).await?;

    Ok(())
}
