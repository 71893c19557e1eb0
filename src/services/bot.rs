//! Automated opponent — stateless heuristic move selection.
//!
//! DESIGN
//! ======
//! `choose_move` is a pure function of the board, the precomputed legal move
//! list, the side to play, and a difficulty tier. No search tree: the hard
//! tier is a fixed weighted sum over positional features plus a one-ply
//! mobility probe. The caller (`MatchRoom`) enforces the forced-pass rule, so
//! the legal move list is never empty here; an empty list returns `None`
//! instead of a panic and is treated as a contract bug by the caller.
//!
//! Tie-breaking for medium/hard is first-seen: `legal_moves` iterates the
//! grid row-major, so selection is deterministic for a given board.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::services::board::{Board, Cell, Pos, Side, SIZE};

// =============================================================================
// DIFFICULTY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn parse(s: &str) -> Option<Difficulty> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

// =============================================================================
// SCORING WEIGHTS (hard tier)
// =============================================================================

const CORNER_WEIGHT: i32 = 120;
const EDGE_WEIGHT: i32 = 15;
const EMPTY_CORNER_NEIGHBOR_PENALTY: i32 = -60;
const FLIP_WEIGHT: i32 = 3;

const CORNERS: [(u8, u8); 4] = [(0, 0), (0, 7), (7, 0), (7, 7)];

// =============================================================================
// SELECTION
// =============================================================================

/// Pick a move for `side` from `legal`. Returns `None` only for an empty
/// move list, which violates the caller contract.
#[must_use]
pub fn choose_move(board: &Board, legal: &[Pos], side: Side, difficulty: Difficulty) -> Option<Pos> {
    if legal.is_empty() {
        return None;
    }
    match difficulty {
        Difficulty::Easy => legal.choose(&mut rand::rng()).copied(),
        Difficulty::Medium => Some(choose_greedy(board, legal, side)),
        Difficulty::Hard => Some(choose_weighted(board, legal, side)),
    }
}

/// Medium: any corner wins outright; otherwise maximize immediate flips.
fn choose_greedy(board: &Board, legal: &[Pos], side: Side) -> Pos {
    if let Some(&corner) = legal.iter().find(|p| is_corner(**p)) {
        return corner;
    }

    let mut best = legal[0];
    let mut best_flips = board.flips_for(best, side).len();
    for &mv in &legal[1..] {
        let flips = board.flips_for(mv, side).len();
        // Strict comparison keeps the first maximal candidate.
        if flips > best_flips {
            best = mv;
            best_flips = flips;
        }
    }
    best
}

/// Hard: positional weights plus flip count minus opponent mobility after a
/// one-ply simulated application.
fn choose_weighted(board: &Board, legal: &[Pos], side: Side) -> Pos {
    let mut best = legal[0];
    let mut best_score = score_candidate(board, legal[0], side);
    for &mv in &legal[1..] {
        let score = score_candidate(board, mv, side);
        if score > best_score {
            best = mv;
            best_score = score;
        }
    }
    best
}

#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn score_candidate(board: &Board, mv: Pos, side: Side) -> i32 {
    let mut score = 0;

    if is_corner(mv) {
        score += CORNER_WEIGHT;
    } else if is_safe_edge(mv) {
        score += EDGE_WEIGHT;
    }
    if touches_empty_corner(board, mv) {
        score += EMPTY_CORNER_NEIGHBOR_PENALTY;
    }

    score += FLIP_WEIGHT * board.flips_for(mv, side).len() as i32;

    // One-ply mobility probe: fewer replies for the opponent is better.
    let mut probe = board.clone();
    if probe.apply(mv, side).is_ok() {
        score -= probe.legal_moves(side.opponent()).len() as i32;
    }

    score
}

// =============================================================================
// POSITIONAL FEATURES
// =============================================================================

fn is_corner(pos: Pos) -> bool {
    CORNERS.contains(&(pos.row, pos.col))
}

/// Edge cell that is not orthogonally or diagonally next to a corner.
fn is_safe_edge(pos: Pos) -> bool {
    let edge = pos.row == 0 || pos.col == 0 || pos.row as usize == SIZE - 1 || pos.col as usize == SIZE - 1;
    if !edge || is_corner(pos) {
        return false;
    }
    !CORNERS
        .iter()
        .any(|&(cr, cc)| pos.row.abs_diff(cr) <= 1 && pos.col.abs_diff(cc) <= 1)
}

/// True when the cell neighbors a corner that is still empty — playing there
/// typically hands the corner to the opponent.
fn touches_empty_corner(board: &Board, pos: Pos) -> bool {
    CORNERS.iter().any(|&(cr, cc)| {
        pos.row.abs_diff(cr) <= 1
            && pos.col.abs_diff(cc) <= 1
            && !is_corner(pos)
            && Pos::new(cr as usize, cc as usize).is_some_and(|corner| board.cell(corner) == Cell::Empty)
    })
}

#[cfg(test)]
#[path = "bot_test.rs"]
mod tests;
