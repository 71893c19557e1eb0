//! Read-only room and leaderboard routes.
//!
//! Mutation happens exclusively over the websocket; these endpoints exist so
//! the lobby and a finished-game page can be rendered from plain HTTP.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::error;

use crate::services::ledger::RatingRecord;
use crate::services::room::{RoomSnapshot, RoomSummary};
use crate::state::AppState;

const DEFAULT_LEADERBOARD_LIMIT: i64 = 20;
const MAX_LEADERBOARD_LIMIT: i64 = 100;

/// `GET /api/rooms` — rooms still waiting for an opponent.
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.registry.list_joinable().await)
}

/// `GET /api/rooms/:id` — full snapshot of one room.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, StatusCode> {
    let handle = state
        .registry
        .get(&room_id)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    let snapshot = handle.lock().await.snapshot();
    Ok(Json(snapshot))
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// `GET /api/leaderboard` — cumulative standings, best rating first.
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<RatingRecord>>, StatusCode> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);

    let standings = state.ledger.standings(limit).await.map_err(|e| {
        error!(error = %e, "leaderboard query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(standings))
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
