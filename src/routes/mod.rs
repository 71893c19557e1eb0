//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the HTTP API and the websocket endpoint under a single
//! Axum router. All gameplay happens over `/api/ws`; the JSON endpoints are
//! read-only projections for the lobby, finished games, and the leaderboard.
//! A static client is served from `STATIC_DIR` at `/`.

pub mod rooms;
pub mod ws;

use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Full application router: API + websocket + static client.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_service = ServeDir::new(static_dir()).append_index_html_on_directories(true);

    Router::new()
        .route("/api/rooms", get(rooms::list_rooms))
        .route("/api/rooms/{id}", get(rooms::get_room))
        .route("/api/leaderboard", get(rooms::leaderboard))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
        .fallback_service(static_service)
}

/// Resolve the path to the static client directory.
fn static_dir() -> PathBuf {
    std::env::var("STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
