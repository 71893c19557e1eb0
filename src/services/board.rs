//! Board — 8×8 Reversi grid with pure legality and flip computation.
//!
//! DESIGN
//! ======
//! The board is a plain 8×8 cell array owned exclusively by its `MatchRoom`.
//! All rules questions (is this move legal, which discs flip) are answered
//! here with no side effects except the single `apply` mutation. Every one of
//! the 8 rays is evaluated against the same pre-move snapshot, so flips from
//! different rays never interact.
//!
//! Iteration order is row-major everywhere, which makes `legal_moves`
//! deterministic — the bot's tie-breaking depends on that.

use serde::{Deserialize, Serialize};

/// Board edge length. The grid is always `SIZE × SIZE`.
pub const SIZE: usize = 8;

/// The 8 scan directions: 4 axis-aligned, 4 diagonal.
const RAYS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

// =============================================================================
// TYPES
// =============================================================================

/// One square of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Empty,
    Black,
    White,
}

/// One of the two competing colors. Black moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Black,
    White,
}

impl Side {
    #[must_use]
    pub fn opponent(self) -> Side {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }

    #[must_use]
    pub fn cell(self) -> Cell {
        match self {
            Side::Black => Cell::Black,
            Side::White => Cell::White,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Black => "black",
            Side::White => "white",
        }
    }
}

/// A grid coordinate. Always in-range by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub row: u8,
    pub col: u8,
}

impl Pos {
    /// Range-checked constructor. Returns `None` outside the 8×8 grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(row: usize, col: usize) -> Option<Pos> {
        if row < SIZE && col < SIZE {
            Some(Pos { row: row as u8, col: col as u8 })
        } else {
            None
        }
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn offset(self, dr: i8, dc: i8) -> Option<Pos> {
        let row = i16::from(self.row) + i16::from(dr);
        let col = i16::from(self.col) + i16::from(dc);
        if (0..SIZE as i16).contains(&row) && (0..SIZE as i16).contains(&col) {
            Some(Pos { row: row as u8, col: col as u8 })
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("illegal move at ({row}, {col})")]
pub struct IllegalMove {
    pub row: u8,
    pub col: u8,
}

// =============================================================================
// BOARD
// =============================================================================

/// 8×8 grid with the canonical four-disc opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[Cell; SIZE]; SIZE],
}

impl Board {
    /// Create a board with the canonical opening: White at (3,3)/(4,4),
    /// Black at (3,4)/(4,3). The opening discs bypass legality — there is
    /// no mover for the initial state.
    #[must_use]
    pub fn new() -> Self {
        let mut board = Board { cells: [[Cell::Empty; SIZE]; SIZE] };
        board.cells[3][3] = Cell::White;
        board.cells[3][4] = Cell::Black;
        board.cells[4][3] = Cell::Black;
        board.cells[4][4] = Cell::White;
        board
    }

    #[must_use]
    pub fn cell(&self, pos: Pos) -> Cell {
        self.cells[pos.row as usize][pos.col as usize]
    }

    /// Raw grid rows, for snapshot serialization.
    #[must_use]
    pub fn grid(&self) -> &[[Cell; SIZE]; SIZE] {
        &self.cells
    }

    /// Disc counts as `(black, white)`.
    #[must_use]
    pub fn counts(&self) -> (u32, u32) {
        let mut black = 0;
        let mut white = 0;
        for row in &self.cells {
            for &cell in row {
                match cell {
                    Cell::Black => black += 1,
                    Cell::White => white += 1,
                    Cell::Empty => {}
                }
            }
        }
        (black, white)
    }

    #[must_use]
    pub fn count(&self, side: Side) -> u32 {
        let (black, white) = self.counts();
        match side {
            Side::Black => black,
            Side::White => white,
        }
    }

    /// True once all 64 cells are occupied.
    #[must_use]
    pub fn is_full(&self) -> bool {
        let (black, white) = self.counts();
        black + white == (SIZE * SIZE) as u32
    }

    /// All legal destinations for `side`, in row-major order.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn legal_moves(&self, side: Side) -> Vec<Pos> {
        let mut moves = Vec::new();
        for row in 0..SIZE {
            for col in 0..SIZE {
                let pos = Pos { row: row as u8, col: col as u8 };
                if self.is_legal(pos, side) {
                    moves.push(pos);
                }
            }
        }
        moves
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn has_legal_move(&self, side: Side) -> bool {
        for row in 0..SIZE {
            for col in 0..SIZE {
                if self.is_legal(Pos { row: row as u8, col: col as u8 }, side) {
                    return true;
                }
            }
        }
        false
    }

    /// A cell is legal iff it is empty and at least one ray holds a non-empty
    /// opposing run terminated by `side`'s own disc.
    #[must_use]
    pub fn is_legal(&self, pos: Pos, side: Side) -> bool {
        if self.cell(pos) != Cell::Empty {
            return false;
        }
        RAYS.iter().any(|&(dr, dc)| !self.ray_run(pos, side, dr, dc).is_empty())
    }

    /// Every cell that would flip if `side` played `pos`. Empty when the move
    /// is illegal. No side effect.
    #[must_use]
    pub fn flips_for(&self, pos: Pos, side: Side) -> Vec<Pos> {
        if self.cell(pos) != Cell::Empty {
            return Vec::new();
        }
        let mut flips = Vec::new();
        for &(dr, dc) in &RAYS {
            flips.extend(self.ray_run(pos, side, dr, dc));
        }
        flips
    }

    /// Place `side` at `pos` and flip every captured run. Returns the flipped
    /// cells. The caller must have checked legality; an illegal coordinate is
    /// a contract error and leaves the board untouched.
    pub fn apply(&mut self, pos: Pos, side: Side) -> Result<Vec<Pos>, IllegalMove> {
        let flips = self.flips_for(pos, side);
        if flips.is_empty() || self.cell(pos) != Cell::Empty {
            return Err(IllegalMove { row: pos.row, col: pos.col });
        }
        self.cells[pos.row as usize][pos.col as usize] = side.cell();
        for flip in &flips {
            self.cells[flip.row as usize][flip.col as usize] = side.cell();
        }
        Ok(flips)
    }

    /// The contiguous opposing run from `pos` along one ray, or empty when
    /// the ray is not terminated by `side`'s own disc.
    fn ray_run(&self, pos: Pos, side: Side, dr: i8, dc: i8) -> Vec<Pos> {
        let mut run = Vec::new();
        let mut cursor = pos;
        loop {
            let Some(next) = cursor.offset(dr, dc) else {
                return Vec::new();
            };
            match self.cell(next) {
                cell if cell == side.opponent().cell() => {
                    run.push(next);
                    cursor = next;
                }
                cell if cell == side.cell() => return run,
                _ => return Vec::new(),
            }
        }
    }

    /// Debug rendering: `●` black, `○` white, `.` empty.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("  0 1 2 3 4 5 6 7\n");
        for (row_idx, row) in self.cells.iter().enumerate() {
            out.push_str(&format!("{row_idx} "));
            for &cell in row {
                out.push_str(match cell {
                    Cell::Empty => ". ",
                    Cell::Black => "● ",
                    Cell::White => "○ ",
                });
            }
            out.push('\n');
        }
        out
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
