//! HTTP front for a running sport panel.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tower_http::trace::TraceLayer;

use crate::panel::{PanelCommand, PanelSnapshot};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    commands: mpsc::Sender<PanelCommand>,
    snapshot: watch::Receiver<PanelSnapshot>,
}

#[derive(Debug, Deserialize)]
struct WeightRequest {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct ViewportRequest {
    x: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewportResponse {
    x: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PanelStatus {
    pub last_weight: Option<f64>,
    pub last_total_distance: f64,
    pub viewport_x: f64,
    pub rendered_at: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Create the HTTP router.
pub fn create_router(
    commands: mpsc::Sender<PanelCommand>,
    snapshot: watch::Receiver<PanelSnapshot>,
) -> Router {
    let state = AppState { commands, snapshot };

    Router::new()
        .route("/sport/weight-graph.png", get(graph_handler))
        .route("/sport/status", get(status_handler))
        .route("/sport/weight", post(save_weight_handler))
        .route("/sport/viewport", post(viewport_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn graph_handler(State(state): State<AppState>) -> Response {
    let texture = state.snapshot.borrow().texture.clone();

    match texture {
        Some(texture) => (
            [(header::CONTENT_TYPE, "image/png")],
            texture.png().to_vec(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "weight graph not rendered yet\n",
        )
            .into_response(),
    }
}

async fn status_handler(State(state): State<AppState>) -> Json<PanelStatus> {
    let snapshot = state.snapshot.borrow().clone();

    Json(PanelStatus {
        last_weight: snapshot.last_weight,
        last_total_distance: snapshot.last_total_distance,
        viewport_x: snapshot.viewport_x,
        rendered_at: snapshot.rendered_at.map(|at| at.to_rfc3339()),
        width: snapshot.texture.as_ref().map(|t| t.width()),
        height: snapshot.texture.as_ref().map(|t| t.height()),
    })
}

async fn save_weight_handler(
    State(state): State<AppState>,
    Json(request): Json<WeightRequest>,
) -> Response {
    if !request.value.is_finite() || request.value <= 0.0 {
        return (StatusCode::UNPROCESSABLE_ENTITY, "weight must be positive\n").into_response();
    }

    let (reply, response) = oneshot::channel();
    let command = PanelCommand::SaveWeight {
        value: request.value,
        reply,
    };

    if state.commands.send(command).await.is_err() {
        return panel_stopped();
    }

    match response.await {
        Ok(Ok(())) => StatusCode::NO_CONTENT.into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response(),
        Err(_) => panel_stopped(),
    }
}

async fn viewport_handler(
    State(state): State<AppState>,
    Json(request): Json<ViewportRequest>,
) -> Response {
    let (reply, response) = oneshot::channel();

    if state
        .commands
        .send(PanelCommand::PanTo {
            x: request.x,
            reply,
        })
        .await
        .is_err()
    {
        return panel_stopped();
    }

    match response.await {
        Ok(x) => Json(ViewportResponse { x }).into_response(),
        Err(_) => panel_stopped(),
    }
}

async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

fn panel_stopped() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "sport panel stopped\n").into_response()
}
