//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Broadcast frames from room peers → forward to client
//!
//! Handlers hold the room mutex for exactly one state transition and emit
//! any peer broadcasts under the lock (broadcast is non-blocking `try_send`).
//! Ledger writes and automated turns are scheduled only after the guard is
//! dropped.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade with `?name=` → send `session:connected` with `client_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply to sender)
//! 4. Close → same path as `room:leave` → broadcast `room:left` → cleanup

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::services;
use crate::services::bot::Difficulty;
use crate::services::room::{GameOver, JoinOutcome, MatchRoom, MoveOutcome};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 32;
const BOT_MOVE_DELAY_MS: u64 = 400;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions for the sender's side of the
/// exchange. Peer broadcasts happen inside the handlers, under the room
/// lock, so a push frame can never interleave with a conflicting mutation.
enum Outcome {
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let name = params.get("name").map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "name required").into_response();
    }
    if name.len() > MAX_NAME_LEN {
        return (StatusCode::BAD_REQUEST, "name too long").into_response();
    }

    ws.on_upgrade(move |socket| run_ws(socket, state, name))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, name: String) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("name", name.clone());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, name, "ws: client connected");

    // Room this client currently occupies, if any.
    let mut current_room: Option<String> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies =
                            process_inbound_text(&state, &mut current_room, client_id, &name, &client_tx, &text).await;
                        for frame in replies {
                            if send_frame(&mut socket, &frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    // Socket gone: same teardown as an explicit room:leave.
    leave_current_room(&state, &mut current_room, client_id).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the
/// sender. Split from the socket loop so tests can exercise dispatch without
/// a live websocket.
async fn process_inbound_text(
    state: &AppState,
    current_room: &mut Option<String>,
    client_id: Uuid,
    name: &str,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err =
                Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the connection's display name as `from`.
    req.from = Some(name.to_string());

    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    let result = match req.prefix() {
        "room" => handle_room(state, current_room, client_id, name, client_tx, &req).await,
        "game" => handle_game(state, current_room.as_deref(), client_id, &req).await,
        "chat" => handle_chat(state, current_room.as_deref(), client_id, &req).await,
        _ => Err(req.error(format!("unknown prefix: {}", req.prefix()))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// ROOM HANDLERS
// =============================================================================

async fn handle_room(
    state: &AppState,
    current_room: &mut Option<String>,
    client_id: Uuid,
    name: &str,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    match req.op() {
        "create" => {
            // Implicitly leave any current room first.
            leave_current_room(state, current_room, client_id).await;

            let (room_id, handle) = state.registry.create(client_id, name, client_tx.clone()).await;
            *current_room = Some(room_id.clone());

            let room = handle.lock().await;
            let mut reply = Data::new();
            reply.insert("room_id".into(), serde_json::json!(room_id));
            reply.insert("snapshot".into(), snapshot_value(&room));
            Ok(Outcome::Reply(reply))
        }
        "join" => {
            let Some(room_id) = req
                .room_id
                .clone()
                .or_else(|| req.data.get("room_id").and_then(|v| v.as_str()).map(String::from))
            else {
                return Err(req.error("room_id required"));
            };

            let handle = match state.registry.get(&room_id).await {
                Ok(h) => h,
                Err(e) => return Err(req.error_from(&e)),
            };

            leave_current_room(state, current_room, client_id).await;

            let mut room = handle.lock().await;
            let outcome = match room.connect(client_id, name, client_tx.clone()) {
                Ok(o) => o,
                Err(e) => return Err(req.error_from(&e)),
            };
            *current_room = Some(room_id.clone());

            let (role, side) = match outcome {
                JoinOutcome::Guest { .. } => ("player", Some("white")),
                JoinOutcome::Reconnected { side } => ("player", Some(side.as_str())),
                JoinOutcome::Spectator => ("spectator", None),
            };

            let joined = Frame::request("room:joined", Data::new())
                .with_room_id(&room_id)
                .with_data("name", name)
                .with_data("role", role)
                .with_data("side", side.map_or(serde_json::Value::Null, serde_json::Value::from))
                .with_data("started", matches!(outcome, JoinOutcome::Guest { started: true }));
            room.broadcast(&joined, Some(client_id));

            let mut reply = Data::new();
            reply.insert("room_id".into(), serde_json::json!(room_id));
            reply.insert("role".into(), serde_json::json!(role));
            reply.insert("side".into(), serde_json::json!(side));
            reply.insert("snapshot".into(), snapshot_value(&room));
            Ok(Outcome::Reply(reply))
        }
        "leave" => {
            if current_room.is_none() {
                return Err(req.error_from(&services::room::RoomError::NotInRoom));
            }
            leave_current_room(state, current_room, client_id).await;
            Ok(Outcome::Done)
        }
        "list" => {
            let rooms = state.registry.list_joinable().await;
            let mut data = Data::new();
            data.insert("rooms".into(), serde_json::to_value(&rooms).unwrap_or_default());
            Ok(Outcome::Reply(data))
        }
        "snapshot" => {
            let handle = resolve_room(state, current_room.as_deref(), req).await?;
            let room = handle.lock().await;
            let mut data = Data::new();
            data.insert("snapshot".into(), snapshot_value(&room));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown room op: {op}"))),
    }
}

// =============================================================================
// GAME HANDLERS
// =============================================================================

async fn handle_game(
    state: &AppState,
    current_room: Option<&str>,
    client_id: Uuid,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let handle = resolve_room(state, current_room, req).await?;

    match req.op() {
        "move" => {
            let (Some(row), Some(col)) = (data_usize(req, "row"), data_usize(req, "col")) else {
                return Err(req.error("row and col required"));
            };

            let mut room = handle.lock().await;
            let outcome = match room.submit_move(client_id, row, col) {
                Ok(o) => o,
                Err(e) => return Err(req.error_from(&e)),
            };

            let data = move_data(&room, &outcome);
            let moved = Frame::request("game:moved", data.clone()).with_room_id(room.id());
            room.broadcast(&moved, Some(client_id));

            let over = outcome.over.clone();
            if let Some(over) = &over {
                room.broadcast(&game_over_frame(room.id(), over), None);
            }
            let bot_next = over.is_none() && room.bot_to_move().is_some();
            let room_id = room.id().to_string();
            drop(room);

            if let Some(over) = over {
                publish_game_over(state, over);
            } else if bot_next {
                spawn_bot_turns(state.clone(), room_id);
            }

            Ok(Outcome::Reply(data))
        }
        "bot" => {
            let difficulty = req
                .data
                .get("difficulty")
                .and_then(|v| v.as_str())
                .and_then(Difficulty::parse)
                .unwrap_or(Difficulty::Medium);

            let mut room = handle.lock().await;
            if let Err(e) = room.attach_bot(difficulty) {
                return Err(req.error_from(&e));
            }

            let joined = Frame::request("room:joined", Data::new())
                .with_room_id(room.id())
                .with_data("name", format!("computer:{}", difficulty.as_str()))
                .with_data("role", "player")
                .with_data("side", "white")
                .with_data("started", true);
            room.broadcast(&joined, Some(client_id));

            let mut reply = Data::new();
            reply.insert("difficulty".into(), serde_json::json!(difficulty.as_str()));
            reply.insert("snapshot".into(), snapshot_value(&room));
            let room_id = room.id().to_string();
            drop(room);

            // Black moves first, so this is normally a no-op; it still covers
            // a bot attached into a resumed position where White is to move.
            spawn_bot_turns(state.clone(), room_id);
            Ok(Outcome::Reply(reply))
        }
        op => Err(req.error(format!("unknown game op: {op}"))),
    }
}

// =============================================================================
// CHAT HANDLER
// =============================================================================

async fn handle_chat(
    state: &AppState,
    current_room: Option<&str>,
    client_id: Uuid,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let handle = resolve_room(state, current_room, req).await?;

    match req.op() {
        "send" => {
            let text = req.data.get("text").and_then(|v| v.as_str()).unwrap_or("").trim();
            if text.is_empty() {
                return Err(req.error("text required"));
            }

            let mut room = handle.lock().await;
            let entry = match room.chat(client_id, text) {
                Ok(e) => e,
                Err(e) => return Err(req.error_from(&e)),
            };

            let mut data = Data::new();
            data.insert("name".into(), serde_json::json!(entry.name));
            data.insert("text".into(), serde_json::json!(entry.text));
            data.insert("ts".into(), serde_json::json!(entry.ts));

            let message = Frame::request("chat:message", data.clone()).with_room_id(room.id());
            room.broadcast(&message, Some(client_id));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown chat op: {op}"))),
    }
}

// =============================================================================
// AUTOMATED TURNS
// =============================================================================

fn spawn_bot_turns(state: AppState, room_id: String) {
    tokio::spawn(async move {
        run_bot_turns(&state, &room_id).await;
    });
}

/// Play automated moves until the turn returns to a human or the match
/// ends. A loop because a forced pass can hand the bot several moves in a
/// row.
async fn run_bot_turns(state: &AppState, room_id: &str) {
    loop {
        tokio::time::sleep(Duration::from_millis(BOT_MOVE_DELAY_MS)).await;

        let Ok(handle) = state.registry.get(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        let outcome = match room.bot_move() {
            Ok(Some(o)) => o,
            Ok(None) => return,
            Err(e) => {
                warn!(%room_id, error = %e, "bot move failed");
                return;
            }
        };

        let moved = Frame::request("game:moved", move_data(&room, &outcome)).with_room_id(room.id());
        room.broadcast(&moved, None);

        let over = outcome.over.clone();
        if let Some(over) = &over {
            room.broadcast(&game_over_frame(room.id(), over), None);
        }
        drop(room);

        if let Some(over) = over {
            publish_game_over(state, over);
            return;
        }
    }
}

// =============================================================================
// TEARDOWN
// =============================================================================

/// Detach the client from its current room, announce the departure, and
/// settle an abandoned match. Shared by `room:leave`, `room:create`/`join`
/// (implicit leave), and socket close.
async fn leave_current_room(state: &AppState, current_room: &mut Option<String>, client_id: Uuid) {
    let Some(room_id) = current_room.take() else {
        return;
    };
    let Ok(handle) = state.registry.get(&room_id).await else {
        return;
    };

    let mut room = handle.lock().await;
    let outcome = room.disconnect(client_id);

    use crate::services::room::DisconnectOutcome;
    let abandoned = match outcome {
        DisconnectOutcome::Unknown => None,
        DisconnectOutcome::SpectatorLeft { name } | DisconnectOutcome::PlayerLeft { name, abandoned: None } => {
            let left = Frame::request("room:left", Data::new())
                .with_room_id(&room_id)
                .with_data("name", name);
            room.broadcast(&left, None);
            None
        }
        DisconnectOutcome::PlayerLeft { name, abandoned: Some(over) } => {
            let left = Frame::request("room:left", Data::new())
                .with_room_id(&room_id)
                .with_data("name", name)
                .with_data("abandoned", true);
            room.broadcast(&left, None);
            room.broadcast(&game_over_frame(&room_id, &over), None);
            Some(over)
        }
    };
    drop(room);

    if let Some(over) = abandoned {
        publish_game_over(state, over);
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn resolve_room(
    state: &AppState,
    current_room: Option<&str>,
    req: &Frame,
) -> Result<services::registry::RoomHandle, Frame> {
    let Some(room_id) = current_room else {
        return Err(req.error_from(&services::room::RoomError::NotInRoom));
    };
    state
        .registry
        .get(room_id)
        .await
        .map_err(|e| req.error_from(&e))
}

fn snapshot_value(room: &MatchRoom) -> serde_json::Value {
    serde_json::to_value(room.snapshot()).unwrap_or_default()
}

fn move_data(room: &MatchRoom, outcome: &MoveOutcome) -> Data {
    let mut data = Data::new();
    data.insert("side".into(), serde_json::json!(outcome.side.as_str()));
    data.insert("row".into(), serde_json::json!(outcome.pos.row));
    data.insert("col".into(), serde_json::json!(outcome.pos.col));
    data.insert("flipped".into(), serde_json::to_value(&outcome.flipped).unwrap_or_default());
    data.insert("pass".into(), serde_json::json!(outcome.pass));
    data.insert("turn".into(), serde_json::json!(room.turn().as_str()));
    let snapshot = room.snapshot();
    data.insert("black_score".into(), serde_json::json!(snapshot.black_score));
    data.insert("white_score".into(), serde_json::json!(snapshot.white_score));
    data
}

fn game_over_frame(room_id: &str, over: &GameOver) -> Frame {
    Frame::request("game:over", Data::new())
        .with_room_id(room_id)
        .with_data("winner", serde_json::json!(over.winner))
        .with_data("black_score", over.black_score)
        .with_data("white_score", over.white_score)
}

/// Fire-and-forget ledger publication. Failures are logged, never surfaced
/// to clients.
fn publish_game_over(state: &AppState, over: GameOver) {
    let ledger = state.ledger.clone();
    tokio::spawn(async move {
        services::ledger::publish_reports(ledger.as_ref(), &over.reports).await;
    });
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data.get("code").and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get("message").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

fn data_usize(req: &Frame, key: &str) -> Option<usize> {
    req.data
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
