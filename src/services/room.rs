//! MatchRoom — the per-match state machine.
//!
//! DESIGN
//! ======
//! A room owns one board plus everything match-scoped: roster, spectators,
//! turn, lifecycle phase, bounded chat and move-history rings, and the
//! connected-client senders used for broadcast. All methods are synchronous
//! state transitions; the websocket layer holds the room's mutex across one
//! operation and performs ledger writes and bot scheduling only after the
//! guard is dropped. Broadcast uses non-blocking `try_send`, so it is safe
//! under the lock.
//!
//! LIFECYCLE
//! =========
//! `Waiting` (fewer than two occupied sides) → `InProgress` → `Over`. The
//! transition to `InProgress` fires exactly when the second side becomes
//! occupied — human join or bot attach — and re-initializes the board.
//!
//! Abandonment policy: end-immediately. If a disconnect leaves exactly one
//! connected side mid-match, that side wins on the spot and ledger reports
//! are issued for both humans.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::error;
use uuid::Uuid;

use crate::frame::{Frame, now_ms};
use crate::services::board::{Board, Cell, Pos, Side};
use crate::services::bot::{self, Difficulty};
use crate::services::ledger::{MatchOutcome, OutcomeReport};

/// Chat ring capacity; oldest entries drop past this.
pub const CHAT_CAP: usize = 100;

/// Move-history ring capacity. A finished game has at most 60 placements.
pub const MOVE_HISTORY_CAP: usize = 64;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("not your turn")]
    NotYourTurn,
    #[error("invalid move")]
    InvalidMove,
    #[error("room full")]
    RoomFull,
    #[error("match not in progress")]
    NotInProgress,
    #[error("name already taken in this room")]
    NameTaken,
    #[error("not joined to this room")]
    NotInRoom,
    #[error("only players can move")]
    NotAPlayer,
}

impl crate::frame::ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotYourTurn => "E_NOT_YOUR_TURN",
            Self::InvalidMove => "E_INVALID_MOVE",
            Self::RoomFull => "E_ROOM_FULL",
            Self::NotInProgress => "E_NOT_IN_PROGRESS",
            Self::NameTaken => "E_NAME_TAKEN",
            Self::NotInRoom => "E_NOT_IN_ROOM",
            Self::NotAPlayer => "E_NOT_A_PLAYER",
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    InProgress,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Black,
    White,
    Draw,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

#[derive(Debug, Clone, Serialize)]
pub struct Player {
    /// Session identity. `None` for the automated stand-in.
    #[serde(skip)]
    pub client_id: Option<Uuid>,
    pub name: String,
    pub side: Side,
    pub connected: bool,
    pub role: Role,
    pub bot: Option<Difficulty>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatEntry {
    pub name: String,
    pub text: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveRecord {
    pub side: Side,
    pub row: u8,
    pub col: u8,
    pub flipped: Vec<Pos>,
    /// True when the opponent had no reply and the turn stayed with the mover.
    pub pass: bool,
    pub ts: i64,
}

/// How `connect` resolved an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Took the open side; `started` is set when this occupied the second side.
    Guest { started: bool },
    /// Re-bound a disconnected player of the same name to the new identity.
    Reconnected { side: Side },
    /// Both sides occupied; joined as a watcher.
    Spectator,
}

#[derive(Debug, Clone)]
pub struct GameOver {
    pub winner: Winner,
    pub black_score: u32,
    pub white_score: u32,
    /// One report per human participant, issued exactly once per match.
    pub reports: Vec<OutcomeReport>,
}

#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub side: Side,
    pub pos: Pos,
    pub flipped: Vec<Pos>,
    /// The opponent was forced to pass; the same side moves again.
    pub pass: bool,
    pub over: Option<GameOver>,
}

#[derive(Debug)]
pub enum DisconnectOutcome {
    /// Identity was not part of this room.
    Unknown,
    SpectatorLeft { name: String },
    PlayerLeft { name: String, abandoned: Option<GameOver> },
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Read-only projection consumed by the presentation boundary.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub phase: Phase,
    pub turn: Side,
    pub winner: Winner,
    pub board: Vec<Vec<Cell>>,
    pub black_score: u32,
    pub white_score: u32,
    pub legal_moves: Vec<Pos>,
    pub players: Vec<Player>,
    pub spectators: Vec<String>,
    pub chat: Vec<ChatEntry>,
    pub moves: Vec<MoveRecord>,
}

/// Lobby projection of a room still waiting for an opponent.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub host_name: String,
    pub phase: Phase,
    pub player_count: usize,
}

// =============================================================================
// MATCH ROOM
// =============================================================================

#[derive(Debug)]
pub struct MatchRoom {
    id: String,
    board: Board,
    phase: Phase,
    turn: Side,
    winner: Winner,
    players: Vec<Player>,
    spectators: HashMap<Uuid, String>,
    chat: VecDeque<ChatEntry>,
    moves: VecDeque<MoveRecord>,
    clients: HashMap<Uuid, mpsc::Sender<Frame>>,
    last_activity: Instant,
}

impl MatchRoom {
    /// Create a `Waiting` room with the host occupying Black.
    #[must_use]
    pub fn new(id: impl Into<String>, host_id: Uuid, host_name: &str, tx: mpsc::Sender<Frame>) -> Self {
        let mut clients = HashMap::new();
        clients.insert(host_id, tx);
        Self {
            id: id.into(),
            board: Board::new(),
            phase: Phase::Waiting,
            turn: Side::Black,
            winner: Winner::Undetermined,
            players: vec![Player {
                client_id: Some(host_id),
                name: host_name.to_string(),
                side: Side::Black,
                connected: true,
                role: Role::Host,
                bot: None,
            }],
            spectators: HashMap::new(),
            chat: VecDeque::new(),
            moves: VecDeque::new(),
            clients,
            last_activity: Instant::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn turn(&self) -> Side {
        self.turn
    }

    /// Still waiting with an open side.
    #[must_use]
    pub fn is_joinable(&self) -> bool {
        self.phase == Phase::Waiting && self.players.len() < 2
    }

    // -------------------------------------------------------------------------
    // CONNECTION LIFECYCLE
    // -------------------------------------------------------------------------

    /// Resolve an inbound identity: reconnect a disconnected same-named
    /// player, occupy the open side, or fall back to spectating.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::NameTaken`] when the display name is already in
    /// use by a connected participant.
    pub fn connect(&mut self, client_id: Uuid, name: &str, tx: mpsc::Sender<Frame>) -> Result<JoinOutcome, RoomError> {
        self.touch();

        // Name-keyed reconnection: identity substitution keeps side and role.
        if let Some(player) = self
            .players
            .iter_mut()
            .find(|p| p.bot.is_none() && !p.connected && p.name == name)
        {
            player.client_id = Some(client_id);
            player.connected = true;
            let side = player.side;
            self.clients.insert(client_id, tx);
            return Ok(JoinOutcome::Reconnected { side });
        }

        let name_in_use = self.players.iter().any(|p| p.connected && p.name == name)
            || self.spectators.values().any(|n| n == name);
        if name_in_use {
            return Err(RoomError::NameTaken);
        }

        if self.players.len() < 2 {
            self.players.push(Player {
                client_id: Some(client_id),
                name: name.to_string(),
                side: Side::White,
                connected: true,
                role: Role::Guest,
                bot: None,
            });
            self.clients.insert(client_id, tx);
            self.start_match();
            return Ok(JoinOutcome::Guest { started: true });
        }

        self.spectators.insert(client_id, name.to_string());
        self.clients.insert(client_id, tx);
        Ok(JoinOutcome::Spectator)
    }

    /// Attach an automated stand-in to the open side and start the match.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::RoomFull`] when both sides are already occupied.
    pub fn attach_bot(&mut self, difficulty: Difficulty) -> Result<(), RoomError> {
        if self.players.len() >= 2 {
            return Err(RoomError::RoomFull);
        }
        self.touch();
        self.players.push(Player {
            client_id: None,
            name: format!("computer:{}", difficulty.as_str()),
            side: Side::White,
            connected: true,
            role: Role::Guest,
            bot: Some(difficulty),
        });
        self.start_match();
        Ok(())
    }

    /// Mark a player disconnected (players are never removed while the match
    /// could resume) or remove a spectator outright. Mid-match, if exactly
    /// one side remains connected, the match ends in its favor immediately.
    pub fn disconnect(&mut self, client_id: Uuid) -> DisconnectOutcome {
        self.touch();
        self.clients.remove(&client_id);

        if let Some(name) = self.spectators.remove(&client_id) {
            return DisconnectOutcome::SpectatorLeft { name };
        }

        let Some(idx) = self.players.iter().position(|p| p.client_id == Some(client_id)) else {
            return DisconnectOutcome::Unknown;
        };
        self.players[idx].connected = false;
        let name = self.players[idx].name.clone();

        // End-immediately abandonment, human opponents only: a match against
        // the automated side stays in progress so the player can reconnect.
        let abandoned = if self.phase == Phase::InProgress {
            let connected_human_sides: Vec<Side> = self
                .players
                .iter()
                .filter(|p| p.connected && p.bot.is_none())
                .map(|p| p.side)
                .collect();
            let all_human = self.players.iter().all(|p| p.bot.is_none());
            match (all_human, &connected_human_sides[..]) {
                (true, [remaining]) => Some(self.end_with_winner(*remaining)),
                _ => None,
            }
        } else {
            None
        };

        DisconnectOutcome::PlayerLeft { name, abandoned }
    }

    // -------------------------------------------------------------------------
    // MOVES
    // -------------------------------------------------------------------------

    /// The move-submission contract: room in progress, identity owns the
    /// side to move, destination legal. Rejections leave state unchanged.
    ///
    /// # Errors
    ///
    /// Returns a specific [`RoomError`] reason for each rejection class.
    pub fn submit_move(&mut self, client_id: Uuid, row: usize, col: usize) -> Result<MoveOutcome, RoomError> {
        if self.phase != Phase::InProgress {
            return Err(RoomError::NotInProgress);
        }
        let player = self
            .players
            .iter()
            .find(|p| p.client_id == Some(client_id))
            .ok_or(RoomError::NotAPlayer)?;
        if player.side != self.turn {
            return Err(RoomError::NotYourTurn);
        }
        let pos = Pos::new(row, col).ok_or(RoomError::InvalidMove)?;
        if !self.board.is_legal(pos, self.turn) {
            return Err(RoomError::InvalidMove);
        }
        self.play(pos)
    }

    /// The automated side's difficulty, when it is to move.
    #[must_use]
    pub fn bot_to_move(&self) -> Option<Difficulty> {
        if self.phase != Phase::InProgress {
            return None;
        }
        self.players
            .iter()
            .find(|p| p.side == self.turn)
            .and_then(|p| p.bot)
    }

    /// Choose and apply one automated move. `Ok(None)` when the side to move
    /// is not a bot.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidMove`] only on a broken selection
    /// contract, which a correct turn-resolution cannot produce.
    pub fn bot_move(&mut self) -> Result<Option<MoveOutcome>, RoomError> {
        let Some(difficulty) = self.bot_to_move() else {
            return Ok(None);
        };
        let legal = self.board.legal_moves(self.turn);
        let Some(pos) = bot::choose_move(&self.board, &legal, self.turn, difficulty) else {
            // Turn resolution guarantees the side to move has a legal move.
            error!(room_id = %self.id, side = self.turn.as_str(), "bot invoked with no legal moves");
            return Err(RoomError::InvalidMove);
        };
        self.play(pos).map(Some)
    }

    /// Apply a pre-validated move and advance the turn.
    ///
    /// Turn-resolution policy: switch to the opponent when they can reply;
    /// keep the turn on a silent forced pass; end the match on a double pass
    /// or a full board.
    fn play(&mut self, pos: Pos) -> Result<MoveOutcome, RoomError> {
        let side = self.turn;
        let flipped = self.board.apply(pos, side).map_err(|_| RoomError::InvalidMove)?;
        push_bounded(
            &mut self.moves,
            MoveRecord { side, row: pos.row, col: pos.col, flipped: flipped.clone(), pass: false, ts: now_ms() },
            MOVE_HISTORY_CAP,
        );
        self.touch();

        let next = side.opponent();
        let mut pass = false;
        let over = if self.board.is_full() {
            Some(self.end_by_count())
        } else if self.board.has_legal_move(next) {
            self.turn = next;
            None
        } else if self.board.has_legal_move(side) {
            pass = true;
            if let Some(last) = self.moves.back_mut() {
                last.pass = true;
            }
            None
        } else {
            Some(self.end_by_count())
        };

        Ok(MoveOutcome { side, pos, flipped, pass, over })
    }

    // -------------------------------------------------------------------------
    // CHAT
    // -------------------------------------------------------------------------

    /// Append to the bounded chat ring. Players and spectators may chat.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::NotInRoom`] for an unknown identity.
    pub fn chat(&mut self, client_id: Uuid, text: &str) -> Result<ChatEntry, RoomError> {
        let name = self
            .players
            .iter()
            .find(|p| p.client_id == Some(client_id))
            .map(|p| p.name.clone())
            .or_else(|| self.spectators.get(&client_id).cloned())
            .ok_or(RoomError::NotInRoom)?;
        self.touch();
        let entry = ChatEntry { name, text: text.to_string(), ts: now_ms() };
        push_bounded(&mut self.chat, entry.clone(), CHAT_CAP);
        Ok(entry)
    }

    // -------------------------------------------------------------------------
    // PROJECTIONS
    // -------------------------------------------------------------------------

    /// Read-only snapshot for broadcast and the HTTP surface.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        let (black_score, white_score) = self.board.counts();
        let legal_moves = if self.phase == Phase::InProgress {
            self.board.legal_moves(self.turn)
        } else {
            Vec::new()
        };
        RoomSnapshot {
            room_id: self.id.clone(),
            phase: self.phase,
            turn: self.turn,
            winner: self.winner,
            board: self.board.grid().iter().map(|row| row.to_vec()).collect(),
            black_score,
            white_score,
            legal_moves,
            players: self.players.clone(),
            spectators: self.spectators.values().cloned().collect(),
            chat: self.chat.iter().cloned().collect(),
            moves: self.moves.iter().cloned().collect(),
        }
    }

    /// Lobby summary line.
    #[must_use]
    pub fn summary(&self) -> RoomSummary {
        let host_name = self
            .players
            .iter()
            .find(|p| p.role == Role::Host)
            .map_or_else(String::new, |p| p.name.clone());
        RoomSummary {
            room_id: self.id.clone(),
            host_name,
            phase: self.phase,
            player_count: self.players.len(),
        }
    }

    // -------------------------------------------------------------------------
    // BROADCAST
    // -------------------------------------------------------------------------

    /// Send a frame to every connected client, optionally excluding one.
    /// Best-effort: a client with a full channel is skipped.
    pub fn broadcast(&self, frame: &Frame, exclude: Option<Uuid>) {
        for (client_id, tx) in &self.clients {
            if exclude == Some(*client_id) {
                continue;
            }
            let _ = tx.try_send(frame.clone());
        }
    }

    // -------------------------------------------------------------------------
    // EVICTION
    // -------------------------------------------------------------------------

    /// Destruction rule: every human player disconnected, no spectators, and
    /// the phase-dependent idle threshold elapsed. Rooms that never left
    /// `Waiting` use the shorter threshold.
    #[must_use]
    pub fn is_evictable(&self, now: Instant, idle: Duration, waiting_idle: Duration) -> bool {
        let humans_gone = self.players.iter().filter(|p| p.bot.is_none()).all(|p| !p.connected);
        if !humans_gone || !self.spectators.is_empty() {
            return false;
        }
        let threshold = if self.phase == Phase::Waiting { waiting_idle } else { idle };
        now.saturating_duration_since(self.last_activity) >= threshold
    }

    // -------------------------------------------------------------------------
    // INTERNAL
    // -------------------------------------------------------------------------

    /// Second side just became occupied: reset the board and hand Black the
    /// first move.
    fn start_match(&mut self) {
        self.board = Board::new();
        self.phase = Phase::InProgress;
        self.turn = Side::Black;
        self.winner = Winner::Undetermined;
        self.moves.clear();
    }

    fn end_by_count(&mut self) -> GameOver {
        let (black, white) = self.board.counts();
        let winner = match black.cmp(&white) {
            std::cmp::Ordering::Greater => Winner::Black,
            std::cmp::Ordering::Less => Winner::White,
            std::cmp::Ordering::Equal => Winner::Draw,
        };
        self.finish(winner)
    }

    fn end_with_winner(&mut self, side: Side) -> GameOver {
        let winner = match side {
            Side::Black => Winner::Black,
            Side::White => Winner::White,
        };
        self.finish(winner)
    }

    /// Transition to `Over` and build the per-human ledger reports. Callable
    /// at most once per match: every path here is guarded by the
    /// `InProgress` phase check.
    fn finish(&mut self, winner: Winner) -> GameOver {
        self.phase = Phase::Over;
        self.winner = winner;
        let (black, white) = self.board.counts();

        let reports = self
            .players
            .iter()
            .filter(|p| p.bot.is_none())
            .map(|p| {
                let outcome = match (winner, p.side) {
                    (Winner::Black, Side::Black) | (Winner::White, Side::White) => MatchOutcome::Win,
                    (Winner::Black | Winner::White, _) => MatchOutcome::Loss,
                    (Winner::Draw | Winner::Undetermined, _) => MatchOutcome::Draw,
                };
                let (own, opp) = match p.side {
                    Side::Black => (black, white),
                    Side::White => (white, black),
                };
                OutcomeReport { name: p.name.clone(), outcome, own_score: own, opponent_score: opp }
            })
            .collect();

        GameOver { winner, black_score: black, white_score: white, reports }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Ring-buffer append: O(1) push and eviction past the cap.
fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    if buf.len() == cap {
        buf.pop_front();
    }
    buf.push_back(item);
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
