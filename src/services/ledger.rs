//! Result ledger — rating and statistics accumulation.
//!
//! DESIGN
//! ======
//! The core reports each concluded match exactly once per human participant;
//! everything past that boundary is this module's concern. The trait keeps
//! rooms testable with an in-memory mock, mirroring how the LLM boundary is
//! mocked in the teacher codebase this server grew out of.
//!
//! ERROR HANDLING
//! ==============
//! Ledger writes are best-effort: a failed upsert is logged and never rolls
//! back in-memory match state. One attempt per report, no retries. Concurrent
//! reports for the same name from different rooms are serialized by Postgres
//! itself (single-row upsert).

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;

// =============================================================================
// TYPES
// =============================================================================

/// How a match ended for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

impl MatchOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MatchOutcome::Win => "win",
            MatchOutcome::Loss => "loss",
            MatchOutcome::Draw => "draw",
        }
    }
}

/// One end-of-match report for one human player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    pub name: String,
    pub outcome: MatchOutcome,
    pub own_score: u32,
    pub opponent_score: u32,
}

/// Persisted per-player record. Round-trips losslessly through the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub name: String,
    pub rating: i32,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub games: i32,
    pub score_diff: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for LedgerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// RATING POLICY
// =============================================================================

const INITIAL_RATING: i32 = 1200;
const RATING_FLOOR: i32 = 100;
const RATING_STEP: i32 = 15;

/// Rating delta for one outcome. Draws leave the rating untouched.
#[must_use]
pub fn rating_delta(outcome: MatchOutcome) -> i32 {
    match outcome {
        MatchOutcome::Win => RATING_STEP,
        MatchOutcome::Loss => -RATING_STEP,
        MatchOutcome::Draw => 0,
    }
}

// =============================================================================
// BOUNDARY TRAIT
// =============================================================================

/// Rating/statistics boundary consumed by rooms at game end.
#[async_trait::async_trait]
pub trait ResultLedger: Send + Sync {
    /// Record one participant's outcome. Called exactly once per human
    /// player per concluded match.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] if the storage write fails.
    async fn record_outcome(&self, report: &OutcomeReport) -> Result<(), LedgerError>;

    /// Current standings ordered by rating, best first.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] if the storage read fails.
    async fn standings(&self, limit: i64) -> Result<Vec<RatingRecord>, LedgerError>;
}

/// Publish a batch of reports, logging failures. At most one attempt each.
pub async fn publish_reports(ledger: &dyn ResultLedger, reports: &[OutcomeReport]) {
    for report in reports {
        if let Err(e) = ledger.record_outcome(report).await {
            warn!(error = %e, name = %report.name, outcome = report.outcome.as_str(), "ledger report failed");
        }
    }
}

// =============================================================================
// POSTGRES IMPLEMENTATION
// =============================================================================

/// Postgres-backed ledger over the `ratings` table.
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ResultLedger for PgLedger {
    async fn record_outcome(&self, report: &OutcomeReport) -> Result<(), LedgerError> {
        let delta = rating_delta(report.outcome);
        let (win, loss, draw) = match report.outcome {
            MatchOutcome::Win => (1, 0, 0),
            MatchOutcome::Loss => (0, 1, 0),
            MatchOutcome::Draw => (0, 0, 1),
        };
        #[allow(clippy::cast_possible_wrap)]
        let diff = report.own_score as i32 - report.opponent_score as i32;

        sqlx::query(
            "INSERT INTO ratings (name, rating, wins, losses, draws, games, score_diff)
             VALUES ($1, GREATEST($7, $8 + $2), $3, $4, $5, 1, $6)
             ON CONFLICT (name) DO UPDATE SET
                 rating = GREATEST($7, ratings.rating + $2),
                 wins = ratings.wins + $3,
                 losses = ratings.losses + $4,
                 draws = ratings.draws + $5,
                 games = ratings.games + 1,
                 score_diff = ratings.score_diff + $6,
                 updated_at = now()",
        )
        .bind(&report.name)
        .bind(delta)
        .bind(win)
        .bind(loss)
        .bind(draw)
        .bind(diff)
        .bind(RATING_FLOOR)
        .bind(INITIAL_RATING)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn standings(&self, limit: i64) -> Result<Vec<RatingRecord>, LedgerError> {
        let rows = sqlx::query_as::<_, (String, i32, i32, i32, i32, i32, i32)>(
            "SELECT name, rating, wins, losses, draws, games, score_diff
             FROM ratings
             ORDER BY rating DESC, name ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, rating, wins, losses, draws, games, score_diff)| RatingRecord {
                name,
                rating,
                wins,
                losses,
                draws,
                games,
                score_diff,
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
