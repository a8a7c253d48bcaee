//! Serene HTTP 服务
//!
//! 启动: cargo run --bin serene-server --features web
//! POST /api/chat  body: { "messages": [{ "role": "user", "content": "..." }] }

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use serene::config::load_config;
use serene::{observability, ChatService};

struct AppState {
    service: ChatService,
}

async fn api_health() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "API is running" }))
}

async fn api_chat(State(state): State<Arc<AppState>>, body: Option<Json<Value>>) -> Response {
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    match state.service.handle_value(&body).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => {
            let status =
                StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(err)).into_response()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let service = ChatService::from_config(&cfg).context("Failed to build tool registry")?;
    tracing::info!(
        backend = service.backend_name(),
        tools = ?service.tool_names(),
        "chat service ready"
    );

    let state = Arc::new(AppState { service });
    let app = Router::new()
        .route("/api/health", get(api_health))
        .route("/api/chat", post(api_chat))
        .with_state(state);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    tracing::info!("Serene server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
