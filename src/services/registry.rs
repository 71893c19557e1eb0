//! Room registry — creation, lookup, lobby listing, and idle sweep.
//!
//! DESIGN
//! ======
//! The outer `RwLock` guards only map insertion/lookup/removal; every room
//! carries its own `tokio::Mutex` so in-room logic never contends across
//! rooms. Lock ordering is registry-then-room everywhere, which keeps the
//! sweeper free to await room locks while holding the map lock.
//!
//! Room ids are short lowercase codes with lookalike characters removed.
//! Destruction is irreversible: a swept id simply stops resolving, and a
//! later reconnect attempt gets "room not found" instead of resurrecting
//! state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::frame::Frame;
use crate::services::room::{MatchRoom, RoomSummary};
use tokio::sync::mpsc;

/// Code alphabet without 0/1/i/l/o lookalikes.
const CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";
const CODE_LEN: usize = 6;

const DEFAULT_ROOM_IDLE_SECS: u64 = 300;
const DEFAULT_WAITING_IDLE_SECS: u64 = 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("room not found: {0}")]
    NotFound(String),
}

impl crate::frame::ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ROOM_NOT_FOUND",
        }
    }
}

/// Shared handle to one live room.
pub type RoomHandle = Arc<Mutex<MatchRoom>>;

// =============================================================================
// REGISTRY
// =============================================================================

pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
    idle_after: Duration,
    waiting_idle_after: Duration,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(idle_after: Duration, waiting_idle_after: Duration) -> Self {
        Self { rooms: RwLock::new(HashMap::new()), idle_after, waiting_idle_after }
    }

    /// Registry with thresholds from `ROOM_IDLE_SECS` / `ROOM_WAITING_IDLE_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let idle = Duration::from_secs(env_parse("ROOM_IDLE_SECS", DEFAULT_ROOM_IDLE_SECS));
        let waiting = Duration::from_secs(env_parse("ROOM_WAITING_IDLE_SECS", DEFAULT_WAITING_IDLE_SECS));
        Self::new(idle, waiting)
    }

    /// Create a room with the host on Black and return its code and handle.
    pub async fn create(&self, host_id: Uuid, host_name: &str, tx: mpsc::Sender<Frame>) -> (String, RoomHandle) {
        let mut rooms = self.rooms.write().await;
        let room_id = loop {
            let candidate = generate_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let handle = Arc::new(Mutex::new(MatchRoom::new(room_id.clone(), host_id, host_name, tx)));
        rooms.insert(room_id.clone(), Arc::clone(&handle));
        info!(%room_id, host = host_name, total = rooms.len(), "room created");
        (room_id, handle)
    }

    /// Look up a live room.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown or swept ids.
    pub async fn get(&self, room_id: &str) -> Result<RoomHandle, RegistryError> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(room_id.to_string()))
    }

    /// Summaries of rooms still waiting with an open slot. Pure projection.
    pub async fn list_joinable(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.read().await;
        let mut out = Vec::new();
        for handle in rooms.values() {
            let room = handle.lock().await;
            if room.is_joinable() {
                out.push(room.summary());
            }
        }
        out.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        out
    }

    /// Apply the destruction rule to every room and return the removed ids.
    pub async fn sweep(&self, now: Instant) -> Vec<String> {
        let mut rooms = self.rooms.write().await;
        let mut removed = Vec::new();
        for (room_id, handle) in rooms.iter() {
            let room = handle.lock().await;
            if room.is_evictable(now, self.idle_after, self.waiting_idle_after) {
                removed.push(room_id.clone());
            }
        }
        for room_id in &removed {
            rooms.remove(room_id);
            info!(%room_id, "room evicted");
        }
        removed
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// SWEEPER TASK
// =============================================================================

/// Spawn the periodic idle sweep. Returns a handle for shutdown.
pub fn spawn_sweep_task(state: crate::state::AppState) -> JoinHandle<()> {
    let interval_secs = env_parse("ROOM_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS);
    info!(interval_secs, "room sweep configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let removed = state.registry.sweep(Instant::now()).await;
            if !removed.is_empty() {
                info!(count = removed.len(), "idle rooms removed");
            }
        }
    })
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
