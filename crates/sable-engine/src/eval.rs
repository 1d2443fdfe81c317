//! Static evaluation interface and the built-in material evaluator.
//!
//! The search treats evaluation as an external collaborator: anything
//! implementing [`Evaluator`] can be plugged in. Implementations that keep
//! incremental state (NNUE accumulators) stash it behind the per-ply
//! [`EvalContext`]; the search marks a context dirty after every move and
//! null move so stale accumulators are never trusted.

use chess::{Color, ALL_PIECES};
use sable_core::Position;

/// Per-ply evaluation context handle.
///
/// The search owns one per ply per thread and flips `dirty` whenever the
/// position at that ply changed. Stateless evaluators ignore it.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    /// Set when the position at this ply changed since the last evaluate.
    pub dirty: bool,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self { dirty: true }
    }
}

/// Static evaluation from White's perspective, in centipawns.
///
/// Implementations must stay strictly inside `(-TABLEBASE_WIN, TABLEBASE_WIN)`.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, pos: &Position, ctx: &mut EvalContext) -> i32;
}

/// Base material values indexed by [`Piece::to_index`].
const MATERIAL: [i32; 6] = [100, 320, 330, 500, 900, 0];

/// Small bonus for the side to move.
const TEMPO: i32 = 10;

#[rustfmt::skip]
const PAWN_PST: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      5,  10,  10, -20, -20,  10,  10,   5,
      5,  -5, -10,   0,   0, -10,  -5,   5,
      0,   0,   0,  20,  20,   0,   0,   0,
      5,   5,  10,  25,  25,  10,   5,   5,
     10,  10,  20,  30,  30,  20,  10,  10,
     50,  50,  50,  50,  50,  50,  50,  50,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
      0,   0,   0,   5,   5,   0,   0,   0,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
      5,  10,  10,  10,  10,  10,  10,   5,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   5,   0,   0,   0,   0, -10,
    -10,   5,   5,   5,   5,   5,   0, -10,
      0,   0,   5,   5,   5,   5,   0,  -5,
     -5,   0,   5,   5,   5,   5,   0,  -5,
    -10,   0,   5,   5,   5,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_PST: [i32; 64] = [
     20,  30,  10,   0,   0,  10,  30,  20,
     20,  20,   0,   0,   0,   0,  20,  20,
    -10, -20, -20, -20, -20, -20, -20, -10,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
];

const PST: [&[i32; 64]; 6] = [
    &PAWN_PST,
    &KNIGHT_PST,
    &BISHOP_PST,
    &ROOK_PST,
    &QUEEN_PST,
    &KING_PST,
];

/// Material + piece-square evaluator. Stateless; the default when no
/// stronger evaluator is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaterialEvaluator;

impl Evaluator for MaterialEvaluator {
    fn evaluate(&self, pos: &Position, ctx: &mut EvalContext) -> i32 {
        ctx.dirty = false;

        let board = pos.board();
        let mut score = 0;

        for piece in ALL_PIECES {
            let value = MATERIAL[piece.to_index()];
            let pst = PST[piece.to_index()];

            for sq in *board.pieces(piece) & *board.color_combined(Color::White) {
                score += value + pst[sq.to_index()];
            }
            for sq in *board.pieces(piece) & *board.color_combined(Color::Black) {
                // Black reads the table mirrored vertically.
                score -= value + pst[sq.to_index() ^ 56];
            }
        }

        score
            + match pos.side_to_move() {
                Color::White => TEMPO,
                Color::Black => -TEMPO,
            }
    }
}

/// Map a White-perspective evaluation to the side to move's perspective.
#[inline]
pub fn from_white_perspective(eval: i32, side: Color) -> i32 {
    match side {
        Color::White => eval,
        Color::Black => -eval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(fen: &str) -> i32 {
        let pos = Position::from_fen(fen).unwrap();
        MaterialEvaluator.evaluate(&pos, &mut EvalContext::default())
    }

    #[test]
    fn startpos_is_roughly_balanced() {
        let score = eval("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        assert!(score.abs() <= TEMPO, "startpos eval {score} should be ~0");
    }

    #[test]
    fn extra_rook_is_roughly_a_rook() {
        let score = eval("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
        assert!((400..=650).contains(&score), "rook-up eval {score}");
    }

    #[test]
    fn symmetric_position_negates_for_black() {
        let white = eval("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
        let black = eval("r5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1");
        assert_eq!(white, -black);
    }

    #[test]
    fn evaluate_clears_dirty_flag() {
        let pos = Position::startpos();
        let mut ctx = EvalContext::default();
        assert!(ctx.dirty);
        MaterialEvaluator.evaluate(&pos, &mut ctx);
        assert!(!ctx.dirty);
    }

    #[test]
    fn perspective_helper_flips_sign() {
        assert_eq!(from_white_perspective(120, Color::White), 120);
        assert_eq!(from_white_perspective(120, Color::Black), -120);
    }
}
