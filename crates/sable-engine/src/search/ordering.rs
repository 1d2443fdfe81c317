//! Move picking and ordering.
//!
//! The picker scores every legal move once and yields them by selection
//! sort. Score bands keep the phases in priority order:
//!
//! | band                  | score                        |
//! |-----------------------|------------------------------|
//! | previous-iteration PV | 1,100,000                    |
//! | TT move hints         | 1,000,000 / 999,000          |
//! | queen promotions      | 800,000                      |
//! | good captures         | 400,000 + MVV-LVA + SEE      |
//! | killers               | 200,000 / 199,000            |
//! | underpromotions       | 150,000                      |
//! | quiet moves           | history (±16,384)            |
//! | losing captures       | -400,000 + SEE               |
//!
//! The search reads scores as opaque except for [`GOOD_CAPTURE`] and the
//! history-pruning threshold, so the bands can move as long as the order
//! holds.

use std::sync::OnceLock;

use chess::{MoveGen, Piece};
use rand::rngs::SmallRng;
use rand::Rng;
use sable_core::{Move, PackedMove, Position, MAX_SEARCH_DEPTH};

use crate::search::heuristics::MoveOrderer;
use crate::search::see::see;
use crate::search::tt::NUM_TT_MOVES;

/// Upper bound on legal moves in any position.
pub const MAX_MOVES: usize = 256;

/// Captures scoring at or above this have non-negative SEE.
pub const GOOD_CAPTURE: i32 = 400_000;

const PV_MOVE_SCORE: i32 = 1_100_000;
const TT_MOVE_SCORE: [i32; NUM_TT_MOVES] = [1_000_000, 999_000];
const QUEEN_PROMOTION_SCORE: i32 = 800_000;
const KILLER_SCORE: [i32; 2] = [200_000, 199_000];
const UNDERPROMOTION_SCORE: i32 = 150_000;
const LOSING_CAPTURE: i32 = -400_000;

/// MVV-LVA scores indexed by `[victim][attacker]`.
///
/// Weights: pawn=1, knight/bishop=3, rook=5, queen=9, king=0;
/// `victim * 16 - attacker`.
const MVV_LVA: [[i32; 6]; 6] = [
    [15, 13, 13, 11, 7, 16],
    [47, 45, 45, 43, 39, 48],
    [47, 45, 45, 43, 39, 48],
    [79, 77, 77, 75, 71, 80],
    [143, 141, 141, 139, 135, 144],
    [-1, -3, -3, -5, -9, 0],
];

/// Incremental move picker over the legal moves of one position.
pub struct MovePicker {
    moves: [Move; MAX_MOVES],
    scores: [i32; MAX_MOVES],
    len: usize,
    cursor: usize,
}

impl MovePicker {
    /// Build a picker.
    ///
    /// `tactical_only` restricts generation to captures and promotions
    /// (quiescence outside check). `tt_moves` and `pv_move` are unvalidated
    /// hints; they only influence scores when they match a generated legal
    /// move.
    pub fn new(
        pos: &Position,
        tt_moves: &[PackedMove; NUM_TT_MOVES],
        pv_move: Move,
        orderer: &MoveOrderer,
        ply: usize,
        tactical_only: bool,
    ) -> Self {
        let mut picker = Self {
            moves: [Move::NULL; MAX_MOVES],
            scores: [0; MAX_MOVES],
            len: 0,
            cursor: 0,
        };

        let board = pos.board();
        let side = pos.side_to_move();
        for cm in MoveGen::new_legal(board) {
            let mv = Move::from_chess(cm, board);
            if tactical_only && mv.is_quiet() {
                continue;
            }

            let score = if !pv_move.is_null() && mv == pv_move {
                PV_MOVE_SCORE
            } else if mv == tt_moves[0] && !tt_moves[0].is_null() {
                TT_MOVE_SCORE[0]
            } else if mv == tt_moves[1] && !tt_moves[1].is_null() {
                TT_MOVE_SCORE[1]
            } else if mv.promotion() == Some(Piece::Queen) {
                QUEEN_PROMOTION_SCORE
            } else if mv.promotion().is_some() {
                UNDERPROMOTION_SCORE
            } else if mv.is_capture() {
                let victim = board.piece_on(mv.dest()).unwrap_or(Piece::Pawn);
                let see_score = see(pos, mv);
                if see_score >= 0 {
                    GOOD_CAPTURE + MVV_LVA[victim.to_index()][mv.piece().to_index()] + see_score
                } else {
                    LOSING_CAPTURE + see_score
                }
            } else if let Some(slot) = orderer.killer_slot(ply, mv) {
                KILLER_SCORE[slot]
            } else {
                orderer.quiet_score(side, mv)
            };

            picker.moves[picker.len] = mv;
            picker.scores[picker.len] = score;
            picker.len += 1;
        }

        picker
    }

    /// Number of moves the picker will yield in total.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Yield the highest-scored remaining move.
    pub fn pick(&mut self) -> Option<(Move, i32)> {
        if self.cursor >= self.len {
            return None;
        }

        let mut best = self.cursor;
        for i in (self.cursor + 1)..self.len {
            if self.scores[i] > self.scores[best] {
                best = i;
            }
        }

        self.moves.swap(self.cursor, best);
        self.scores.swap(self.cursor, best);

        let result = (self.moves[self.cursor], self.scores[self.cursor]);
        self.cursor += 1;
        Some(result)
    }

    /// Randomize the yield order. Helper threads call this at the root so
    /// lazy-SMP workers explore different subtrees first.
    pub fn shuffle(&mut self, rng: &mut SmallRng) {
        for score in self.scores[..self.len].iter_mut() {
            *score = rng.gen_range(0..1000);
        }
    }
}

// ---------------------------------------------------------------------------
// Late-move reduction table
// ---------------------------------------------------------------------------

/// Move indexes past this share the last table column.
pub const MAX_REDUCED_MOVES: usize = 64;

static LMR_TABLE: OnceLock<Vec<[u8; MAX_REDUCED_MOVES]>> = OnceLock::new();

fn lmr_table() -> &'static [[u8; MAX_REDUCED_MOVES]] {
    LMR_TABLE.get_or_init(|| {
        let mut table = vec![[0u8; MAX_REDUCED_MOVES]; MAX_SEARCH_DEPTH as usize + 1];
        for (depth, row) in table.iter_mut().enumerate() {
            for (move_index, entry) in row.iter_mut().enumerate() {
                let reduction = -1.25
                    + 0.8 * ((depth + 1) as f64).ln() * ((move_index + 1) as f64).ln();
                *entry = reduction.clamp(0.0, 255.0) as u8;
            }
        }
        table
    })
}

/// Base late-move reduction for a (depth, move index) pair.
pub fn lmr_reduction(depth: i32, move_index: u32) -> i32 {
    let depth = depth.clamp(0, MAX_SEARCH_DEPTH) as usize;
    let move_index = (move_index as usize).min(MAX_REDUCED_MOVES - 1);
    lmr_table()[depth][move_index] as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use sable_core::PackedMove;

    fn no_hints() -> [PackedMove; NUM_TT_MOVES] {
        [PackedMove::NULL; NUM_TT_MOVES]
    }

    fn drain(picker: &mut MovePicker) -> Vec<(Move, i32)> {
        std::iter::from_fn(|| picker.pick()).collect()
    }

    #[test]
    fn yields_all_legal_moves_from_startpos() {
        let pos = Position::startpos();
        let orderer = MoveOrderer::new();
        let mut picker = MovePicker::new(&pos, &no_hints(), Move::NULL, &orderer, 0, false);
        assert_eq!(picker.len(), 20);
        assert_eq!(drain(&mut picker).len(), 20);
    }

    #[test]
    fn tactical_only_is_empty_at_startpos() {
        let pos = Position::startpos();
        let orderer = MoveOrderer::new();
        let picker = MovePicker::new(&pos, &no_hints(), Move::NULL, &orderer, 0, true);
        assert!(picker.is_empty());
    }

    #[test]
    fn tt_move_comes_first() {
        let pos = Position::startpos();
        let orderer = MoveOrderer::new();
        let hint = pos.parse_uci_move("b1c3").unwrap();
        let mut hints = no_hints();
        hints[0] = hint.packed();

        let mut picker = MovePicker::new(&pos, &hints, Move::NULL, &orderer, 0, false);
        let (first, score) = picker.pick().unwrap();
        assert_eq!(first, hint);
        assert_eq!(score, TT_MOVE_SCORE[0]);
    }

    #[test]
    fn pv_move_outranks_tt_move() {
        let pos = Position::startpos();
        let orderer = MoveOrderer::new();
        let tt_mv = pos.parse_uci_move("b1c3").unwrap();
        let pv_mv = pos.parse_uci_move("e2e4").unwrap();
        let mut hints = no_hints();
        hints[0] = tt_mv.packed();

        let mut picker = MovePicker::new(&pos, &hints, pv_mv, &orderer, 0, false);
        assert_eq!(picker.pick().unwrap().0, pv_mv);
        assert_eq!(picker.pick().unwrap().0, tt_mv);
    }

    #[test]
    fn good_capture_outranks_quiets_and_losing_captures() {
        // Qxh7 wins a pawn; Qxd5 loses the queen to cxd5.
        let pos = Position::from_fen("4k3/7p/2p5/3p4/4Q3/8/8/4K3 w - - 0 1").unwrap();
        let orderer = MoveOrderer::new();
        let mut picker = MovePicker::new(&pos, &no_hints(), Move::NULL, &orderer, 0, false);

        let (first, first_score) = picker.pick().unwrap();
        assert_eq!(first.to_uci(), "e4h7");
        assert!(first_score >= GOOD_CAPTURE);

        let rest = drain(&mut picker);
        let (_, losing_score) = rest
            .iter()
            .find(|(m, _)| m.to_uci() == "e4d5")
            .expect("Qxd5 should be generated");
        assert!(*losing_score < 0, "losing capture must sort below quiets");
        // Every quiet move sits between the two captures.
        for (mv, score) in &rest {
            if mv.is_quiet() {
                assert!(*score > *losing_score && *score < first_score);
            }
        }
    }

    #[test]
    fn killers_rank_between_captures_and_history() {
        let pos = Position::startpos();
        let mut orderer = MoveOrderer::new();
        let killer = pos.parse_uci_move("g1f3").unwrap();
        orderer.update_killer(4, killer);

        let mut picker = MovePicker::new(&pos, &no_hints(), Move::NULL, &orderer, 4, false);
        assert_eq!(picker.pick().unwrap(), (killer, KILLER_SCORE[0]));
    }

    #[test]
    fn queen_promotion_ranks_above_underpromotion() {
        let pos = Position::from_fen("8/4P1k1/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let orderer = MoveOrderer::new();
        let mut picker = MovePicker::new(&pos, &no_hints(), Move::NULL, &orderer, 0, true);
        let (first, score) = picker.pick().unwrap();
        assert_eq!(first.promotion(), Some(Piece::Queen));
        assert_eq!(score, QUEEN_PROMOTION_SCORE);
        for (mv, score) in drain(&mut picker) {
            assert!(mv.is_underpromotion());
            assert_eq!(score, UNDERPROMOTION_SCORE);
        }
    }

    #[test]
    fn shuffle_keeps_move_set() {
        let pos = Position::startpos();
        let orderer = MoveOrderer::new();
        let mut picker = MovePicker::new(&pos, &no_hints(), Move::NULL, &orderer, 0, false);
        let mut rng = SmallRng::seed_from_u64(42);
        picker.shuffle(&mut rng);

        let mut moves: Vec<String> = drain(&mut picker).iter().map(|(m, _)| m.to_uci()).collect();
        moves.sort();
        let mut expected: Vec<String> =
            Position::startpos().legal_moves().iter().map(|m| m.to_uci()).collect();
        expected.sort();
        assert_eq!(moves, expected);
    }

    #[test]
    fn lmr_table_shape() {
        assert_eq!(lmr_reduction(1, 1), 0, "early moves at low depth are not reduced");
        assert!(lmr_reduction(20, 30) > lmr_reduction(3, 2));
        assert!(lmr_reduction(200, 500) > 0, "indexes clamp instead of panicking");
        let max = lmr_reduction(MAX_SEARCH_DEPTH, MAX_REDUCED_MOVES as u32);
        assert!(max <= 255);
    }
}
