//! TravelGuide Web 前端（axum）
//!
//! - `POST /api/chat`：`{message, user_id?}` → `{success, response}`
//! - `GET /api/health`：健康检查

#![cfg(feature = "web")]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use travelguide::{agent::build_orchestrator, observability, Orchestrator};

const ANONYMOUS_USER: &str = "anonymous";

#[derive(Parser)]
#[command(name = "travelguide-web")]
#[command(about = "Travel assistant HTTP API", long_about = None)]
#[command(version)]
struct Cli {
    /// Extra TOML config file layered over config/default.toml
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

fn app(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/health", get(api_health))
        .with_state(orchestrator)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = Cli::parse();
    let (cfg, orchestrator) = build_orchestrator(cli.config);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.web.port));
    tracing::info!("{} Web API: http://{}", cfg.app.name, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(Arc::new(orchestrator))).await?;

    Ok(())
}

async fn api_chat(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let message = req.message.unwrap_or_default();
    if message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Keine Nachricht angegeben" })),
        )
            .into_response();
    }

    let user_id = req
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS_USER.to_string());

    let response = orchestrator.handle(&message, &user_id).await;
    Json(json!({ "success": true, "response": response })).into_response()
}

async fn api_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
