//! Per-thread search state.
//!
//! Everything a worker mutates during a search lives here: the per-ply
//! stack the improving heuristic reads, the triangular PV table, killer
//! and history state, the repetition key history, lazily allocated
//! evaluator contexts, and the node cache feeding time management.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use sable_core::{Move, MAX_PLY};

use crate::eval::EvalContext;
use crate::search::heuristics::MoveOrderer;
use crate::search::node_cache::NodeCache;
use crate::search::stats::ThreadStats;
use crate::search::PvLine;

/// Per-ply frame recorded on the way down. Children read ancestor frames
/// for the improving heuristic and the double-null-move guard; frames are
/// written before recursing, so ancestors are always populated.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StackFrame {
    pub static_eval: Option<i32>,
    pub is_null_move: bool,
}

/// Triangular principal-variation table: row `ply` holds the best line
/// found from that height.
pub(crate) struct PvTable {
    lines: Vec<[Move; MAX_PLY]>,
    lens: Vec<usize>,
}

impl PvTable {
    fn new() -> Self {
        Self {
            lines: vec![[Move::NULL; MAX_PLY]; MAX_PLY],
            lens: vec![0; MAX_PLY],
        }
    }

    #[inline]
    pub fn clear_ply(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.lens[ply] = 0;
        }
    }

    /// Set `mv` as the head of the line at `ply`, followed by the line
    /// already collected at `ply + 1`.
    pub fn update(&mut self, ply: usize, mv: Move) {
        if ply + 1 >= MAX_PLY {
            return;
        }
        let (head, tail) = self.lines.split_at_mut(ply + 1);
        let child_len = self.lens[ply + 1].min(MAX_PLY - 1);
        head[ply][0] = mv;
        head[ply][1..=child_len].copy_from_slice(&tail[0][..child_len]);
        self.lens[ply] = child_len + 1;
    }

    #[inline]
    pub fn line(&self, ply: usize) -> &[Move] {
        &self.lines[ply][..self.lens[ply]]
    }
}

/// State owned by one search worker.
pub(crate) struct ThreadData {
    pub thread_id: usize,
    pub is_main: bool,
    /// Depth of the iterative-deepening iteration in progress.
    pub root_depth: i32,
    /// Pending statistics batch, folded into the global counters.
    pub batch: ThreadStats,
    /// Monotonic local node count; drives periodic stop checks.
    pub total_nodes: u64,
    pub orderer: MoveOrderer,
    /// Completed PV lines from the previous depth iteration.
    pub prev_pv_lines: Vec<PvLine>,
    pub stack: Vec<StackFrame>,
    /// Zobrist keys of positions behind the current node: the game
    /// prefix, then the search path. Pushed/popped around recursion.
    pub key_history: Vec<u64>,
    /// Length of the game prefix inside `key_history`.
    pub game_history_len: usize,
    eval_stack: Vec<EvalContext>,
    pub pv: PvTable,
    pub node_cache: NodeCache,
    pub rng: SmallRng,
}

impl ThreadData {
    pub fn new(thread_id: usize, game_keys: &[u64]) -> Self {
        Self {
            thread_id,
            is_main: thread_id == 0,
            root_depth: 0,
            batch: ThreadStats::default(),
            total_nodes: 0,
            orderer: MoveOrderer::new(),
            prev_pv_lines: Vec::new(),
            stack: vec![StackFrame::default(); MAX_PLY + 2],
            key_history: game_keys.to_vec(),
            game_history_len: game_keys.len(),
            eval_stack: Vec::new(),
            pv: PvTable::new(),
            node_cache: NodeCache::new(),
            rng: SmallRng::seed_from_u64(0x5AB1E ^ (thread_id as u64).wrapping_mul(0x9E37_79B9)),
        }
    }

    /// The evaluator context for a ply, allocated on first use.
    pub fn eval_context(&mut self, ply: usize) -> &mut EvalContext {
        if self.eval_stack.len() <= ply {
            self.eval_stack.resize_with(ply + 1, EvalContext::default);
        }
        &mut self.eval_stack[ply]
    }

    /// Flag the context at `ply` stale after a move or null move.
    #[inline]
    pub fn mark_eval_dirty(&mut self, ply: usize) {
        self.eval_context(ply).dirty = true;
    }

    /// Move hint from the previous iteration's PV line at this height.
    pub fn pv_hint(&self, eligible: bool, pv_index: usize, ply: usize) -> Move {
        if !eligible || pv_index >= self.prev_pv_lines.len() {
            return Move::NULL;
        }
        *self.prev_pv_lines[pv_index]
            .moves
            .get(ply)
            .unwrap_or(&Move::NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{Piece, Square};

    fn mv(from: Square, to: Square) -> Move {
        Move::new(from, to, Piece::Pawn, None, false, false, false)
    }

    #[test]
    fn pv_table_builds_lines_bottom_up() {
        let mut pv = PvTable::new();
        pv.clear_ply(2);
        pv.update(1, mv(Square::E7, Square::E5));
        pv.update(0, mv(Square::E2, Square::E4));

        let line = pv.line(0);
        assert_eq!(line.len(), 2);
        assert_eq!(line[0], mv(Square::E2, Square::E4));
        assert_eq!(line[1], mv(Square::E7, Square::E5));
    }

    #[test]
    fn pv_clear_ply_truncates() {
        let mut pv = PvTable::new();
        pv.clear_ply(1);
        pv.update(0, mv(Square::E2, Square::E4));
        assert_eq!(pv.line(0).len(), 1);
        pv.clear_ply(0);
        assert!(pv.line(0).is_empty());
    }

    #[test]
    fn eval_contexts_allocate_lazily() {
        let mut td = ThreadData::new(0, &[]);
        td.eval_context(10).dirty = false;
        assert!(!td.eval_context(10).dirty);
        td.mark_eval_dirty(10);
        assert!(td.eval_context(10).dirty);
        // Lower plies were allocated on the way.
        assert!(td.eval_context(3).dirty);
    }

    #[test]
    fn pv_hint_respects_eligibility_and_length() {
        let mut td = ThreadData::new(0, &[]);
        td.prev_pv_lines = vec![PvLine {
            moves: vec![mv(Square::E2, Square::E4), mv(Square::E7, Square::E5)],
            score: 30,
        }];

        assert_eq!(td.pv_hint(true, 0, 0), mv(Square::E2, Square::E4));
        assert_eq!(td.pv_hint(true, 0, 1), mv(Square::E7, Square::E5));
        assert!(td.pv_hint(true, 0, 2).is_null(), "past the line end");
        assert!(td.pv_hint(false, 0, 0).is_null(), "not eligible");
        assert!(td.pv_hint(true, 3, 0).is_null(), "no such PV index");
    }

    #[test]
    fn thread_rngs_differ() {
        use rand::Rng;
        let mut a = ThreadData::new(1, &[]);
        let mut b = ThreadData::new(2, &[]);
        let xs: Vec<u32> = (0..4).map(|_| a.rng.gen()).collect();
        let ys: Vec<u32> = (0..4).map(|_| b.rng.gen()).collect();
        assert_ne!(xs, ys);
    }
}
