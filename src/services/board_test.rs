use super::test_helpers::{board_from_sketch, pos};
use super::*;

#[test]
fn new_board_has_canonical_opening() {
    let board = Board::new();
    assert_eq!(board.cell(pos(3, 3)), Cell::White);
    assert_eq!(board.cell(pos(3, 4)), Cell::Black);
    assert_eq!(board.cell(pos(4, 3)), Cell::Black);
    assert_eq!(board.cell(pos(4, 4)), Cell::White);
    assert_eq!(board.counts(), (2, 2));
    assert!(!board.is_full());
}

#[test]
fn opening_legal_moves_for_black() {
    let board = Board::new();
    let moves = board.legal_moves(Side::Black);
    assert_eq!(moves, vec![pos(2, 3), pos(3, 2), pos(4, 5), pos(5, 4)]);
}

#[test]
fn opening_move_flips_one_disc() {
    let mut board = Board::new();
    let flips = board.apply(pos(2, 3), Side::Black).expect("opening move is legal");
    assert_eq!(flips, vec![pos(3, 3)]);
    assert_eq!(board.counts(), (4, 1));
    assert_eq!(board.cell(pos(2, 3)), Cell::Black);
    assert_eq!(board.cell(pos(3, 3)), Cell::Black);
}

#[test]
fn legal_moves_never_include_occupied_cells() {
    let board = Board::new();
    for side in [Side::Black, Side::White] {
        for mv in board.legal_moves(side) {
            assert_eq!(board.cell(mv), Cell::Empty);
        }
    }
}

#[test]
fn every_legal_move_has_a_capturing_ray() {
    let board = Board::new();
    for side in [Side::Black, Side::White] {
        for mv in board.legal_moves(side) {
            assert!(!board.flips_for(mv, side).is_empty());
        }
    }
}

#[test]
fn move_adjacent_only_to_own_discs_is_illegal() {
    // Black disc cluster with no white run to bracket.
    let board = board_from_sketch(
        "........
         ........
         ........
         ...BB...
         ...BB...
         ........
         ........
         ........",
    );
    assert!(!board.is_legal(pos(3, 2), Side::Black));
    assert!(board.legal_moves(Side::Black).is_empty());
}

#[test]
fn ray_running_off_board_never_flips() {
    // A white run that reaches the edge has no black terminator.
    let board = board_from_sketch(
        "WW......
         ........
         ........
         ........
         ........
         ........
         ........
         ........",
    );
    assert!(board.flips_for(pos(0, 2), Side::Black).is_empty());
    assert!(!board.is_legal(pos(0, 2), Side::Black));
}

#[test]
fn apply_rejects_illegal_coordinate() {
    let mut board = Board::new();
    let before = board.clone();
    let err = board.apply(pos(0, 0), Side::Black).unwrap_err();
    assert_eq!(err, IllegalMove { row: 0, col: 0 });
    assert_eq!(board, before, "failed apply must not mutate the board");
}

#[test]
fn apply_rejects_occupied_cell() {
    let mut board = Board::new();
    assert!(board.apply(pos(3, 3), Side::Black).is_err());
}

#[test]
fn apply_disc_accounting() {
    // For every legal opening move: mover gains 1 + flips, opponent loses
    // exactly the flip count, total grows by exactly 1.
    let board = Board::new();
    for mv in board.legal_moves(Side::Black) {
        let mut b = board.clone();
        let (black_before, white_before) = b.counts();
        let flips = b.apply(mv, Side::Black).expect("move from legal_moves applies");
        let flipped = flips.len() as u32;
        let (black_after, white_after) = b.counts();
        assert_eq!(black_after, black_before + 1 + flipped);
        assert_eq!(white_after, white_before - flipped);
        assert_eq!(black_after + white_after, black_before + white_before + 1);
    }
}

#[test]
fn multi_ray_capture_flips_all_rays() {
    // Black at (4,1) brackets white runs east and north-east independently.
    let board = board_from_sketch(
        "........
         ........
         ...B....
         ..W.....
         ..WWB...
         ........
         ........
         ........",
    );
    let flips = {
        let mut b = board.clone();
        b.apply(pos(4, 1), Side::Black).expect("double capture is legal")
    };
    assert!(flips.contains(&pos(4, 2)));
    assert!(flips.contains(&pos(4, 3)));
    assert!(flips.contains(&pos(3, 2)));
    assert_eq!(flips.len(), 3);
}

#[test]
fn rays_evaluate_against_pre_move_snapshot() {
    // The east run and the north run are separate captures; flipping one
    // must not extend the other.
    let board = board_from_sketch(
        "........
         ........
         ..B.....
         ..W.....
         ..WWB...
         ........
         ........
         ........",
    );
    let mut b = board;
    let flips = b.apply(pos(5, 2), Side::Black).expect("legal");
    assert!(flips.contains(&pos(3, 2)));
    assert!(flips.contains(&pos(4, 2)));
    assert!(!flips.contains(&pos(4, 3)), "east neighbor has no black terminator pre-move");
}

#[test]
fn legal_moves_is_idempotent() {
    let board = Board::new();
    let first = board.legal_moves(Side::Black);
    let second = board.legal_moves(Side::Black);
    assert_eq!(first, second);
}

#[test]
fn full_board_reports_full() {
    let board = board_from_sketch(&"B".repeat(64));
    assert!(board.is_full());
    assert_eq!(board.counts(), (64, 0));
    assert!(board.legal_moves(Side::White).is_empty());
}

#[test]
fn side_opponent_round_trip() {
    assert_eq!(Side::Black.opponent(), Side::White);
    assert_eq!(Side::White.opponent(), Side::Black);
    assert_eq!(Side::Black.opponent().opponent(), Side::Black);
}

#[test]
fn pos_rejects_out_of_range() {
    assert!(Pos::new(8, 0).is_none());
    assert!(Pos::new(0, 8).is_none());
    assert!(Pos::new(7, 7).is_some());
}

#[test]
fn render_contains_all_glyphs() {
    let rendered = Board::new().render();
    assert!(rendered.contains('●'));
    assert!(rendered.contains('○'));
    assert!(rendered.contains('.'));
}
