//! HTTP API server for integration with other systems.
//!
//! Jobs submitted over HTTP are enqueued on the same bus the workers
//! consume; the response returns immediately with the job id, and item
//! progress is observable through the items endpoints.

use crate::bus::MessageBus;
use crate::cli::Output;
use crate::config::Settings;
use crate::model::{Command, CommandPayload, Item};
use crate::orchestrator::{build_pipeline, run_workers};
use crate::store::ItemStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Shared application state.
struct AppState {
    store: Arc<dyn ItemStore>,
    bus: Arc<dyn MessageBus>,
}

/// Run the HTTP API server with pipeline workers in the same process.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let (bus, orchestrator) = build_pipeline(&settings)?;

    let state = Arc::new(AppState {
        store: orchestrator.store(),
        bus: bus.clone(),
    });

    let _workers = run_workers(bus, orchestrator);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/jobs", post(submit_job))
        .route("/items", get(list_items))
        .route("/items/{item_id}", get(get_item))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Oppsum API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Submit Job", "POST /jobs");
    Output::kv("List Items", "GET  /items");
    Output::kv("Get Item", "GET  /items/:item_id");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct JobRequest {
    /// Channel URL, video URL, or video ID
    input: String,
    #[serde(default)]
    max_videos: Option<usize>,
}

#[derive(Serialize)]
struct JobResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct ItemsQuery {
    job_id: Option<String>,
}

#[derive(Serialize)]
struct ItemsResponse {
    items: Vec<Item>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobRequest>,
) -> impl IntoResponse {
    if req.input.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "input must not be empty".to_string(),
            }),
        )
            .into_response();
    }

    let job_id = Uuid::new_v4().to_string();
    let command = Command::new(
        job_id.clone(),
        job_id.clone(),
        CommandPayload::Discover {
            channel_url: req.input,
            max_videos: req.max_videos,
        },
    );

    match state.bus.send_command(command).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(JobResponse { job_id })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ItemsQuery>,
) -> impl IntoResponse {
    match state.store.list_items(query.job_id.as_deref()).await {
        Ok(items) => Json(ItemsResponse {
            total: items.len(),
            items,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_item(&item_id).await {
        Ok(Some(item)) => Json(item).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Item not found: {}", item_id),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
