//! The search subsystem.
//!
//! [`Search`] owns the shared transposition table and the stop flag and
//! dispatches root searches. Worker threads run independent iterative
//! deepening over the same root (lazy SMP): thread 0 reports results and
//! manages time, helpers contribute nodes and table entries with a
//! shuffled root order.

pub mod control;
pub mod heuristics;
pub mod node_cache;
pub mod ordering;
pub mod see;
pub mod stats;
pub mod tt;

mod aspiration;
mod negamax;
mod qsearch;
mod thread;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use sable_core::{is_mate_score, Move, Position, TABLEBASE_WIN};

use crate::eval::{Evaluator, MaterialEvaluator};
use crate::params::Params;
use crate::tablebase::{NoTablebase, TablebaseProber};
use crate::time::{update_ideal_time, TimeManagerState, TimeUpdate};

use aspiration::{aspiration_search, AspirationInput};
use control::SearchLimits;
use negamax::{negamax, NodeInfo};
use stats::Stats;
use thread::ThreadData;
use tt::{Bounds, TranspositionTable};

/// One line of play with its score.
#[derive(Debug, Clone, Default)]
pub struct PvLine {
    pub moves: Vec<Move>,
    /// Centipawns from the side to move's perspective.
    pub score: i32,
}

/// Progress callbacks from the main search thread.
#[derive(Debug)]
pub enum SearchReport<'a> {
    /// A completed (or bounded) root result for one PV line.
    Pv {
        depth: i32,
        seldepth: u32,
        pv_index: usize,
        score: i32,
        /// `Exact`, or the bound type of an aspiration fail.
        bounds: Bounds,
        nodes: u64,
        time: Duration,
        pv: &'a [Move],
    },
    /// The root move currently being searched (long searches only).
    CurrentMove { depth: i32, mv: Move, number: u32 },
}

/// Per-search configuration.
#[derive(Debug, Clone)]
pub struct SearchParam {
    pub limits: SearchLimits,
    pub num_pv_lines: usize,
    pub num_threads: usize,
    pub is_ponder: bool,
    /// Allow an immediate root tablebase move.
    pub use_root_tablebase: bool,
    /// Root moves excluded from every PV line.
    pub excluded_moves: Vec<Move>,
}

impl Default for SearchParam {
    fn default() -> Self {
        Self {
            limits: SearchLimits::default(),
            num_pv_lines: 1,
            num_threads: 1,
            is_ponder: false,
            use_root_tablebase: true,
            excluded_moves: Vec::new(),
        }
    }
}

/// Final outcome of one search.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Best lines, strongest first. Empty when the root is terminal.
    pub lines: Vec<PvLine>,
    /// Deepest fully completed iteration.
    pub depth: i32,
    pub nodes: u64,
    pub seldepth: u32,
}

impl SearchResult {
    pub fn best_move(&self) -> Option<Move> {
        self.lines.first().and_then(|l| l.moves.first().copied())
    }

    pub fn ponder_move(&self) -> Option<Move> {
        self.lines.first().and_then(|l| l.moves.get(1).copied())
    }

    pub fn score(&self) -> Option<i32> {
        self.lines.first().map(|l| l.score)
    }
}

/// Borrowed view each worker gets of the shared search state.
pub(crate) struct SearchContext<'a> {
    pub tt: &'a TranspositionTable,
    pub stats: &'a Stats,
    pub stop: &'a AtomicBool,
    pub limits: &'a SearchLimits,
    pub params: &'a Params,
    pub evaluator: &'a dyn Evaluator,
    pub tablebase: &'a dyn TablebaseProber,
    pub is_ponder: bool,
    /// Present on the main thread only.
    pub report: Option<&'a dyn Fn(SearchReport<'_>)>,
}

impl SearchContext<'_> {
    /// Cooperative stop check; see [`control::check_stop`].
    #[inline]
    pub fn check_stop(&self, td: &ThreadData, is_root_node: bool) -> bool {
        control::check_stop(
            self.stop,
            self.limits,
            self.is_ponder,
            self.stats.nodes() + td.batch.nodes,
            td.total_nodes,
            is_root_node,
        )
    }
}

/// The search coordinator.
pub struct Search {
    tt: TranspositionTable,
    stop: Arc<AtomicBool>,
    params: Params,
    evaluator: Arc<dyn Evaluator>,
    tablebase: Arc<dyn TablebaseProber>,
}

impl Search {
    /// Create a coordinator with a transposition table of `hash_mb` MB.
    pub fn new(hash_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(hash_mb),
            stop: Arc::new(AtomicBool::new(false)),
            params: Params::default(),
            evaluator: Arc::new(MaterialEvaluator),
            tablebase: Arc::new(NoTablebase),
        }
    }

    pub fn set_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.evaluator = evaluator;
    }

    pub fn set_tablebase(&mut self, tablebase: Arc<dyn TablebaseProber>) {
        self.tablebase = tablebase;
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Adjust tunables between searches.
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Resize the transposition table to roughly `mb` megabytes.
    pub fn resize_tt(&mut self, mb: usize) {
        self.tt = TranspositionTable::new(mb);
    }

    /// Clear the transposition table.
    pub fn clear(&self) {
        self.tt.clear();
    }

    /// Shared handle to the stop flag.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Request every worker to unwind.
    pub fn stop_search(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Run a search from `root`. `game_keys` are the Zobrist keys of the
    /// positions played before the root, oldest first, for repetition
    /// detection. `report` receives progress from the main thread.
    pub fn run(
        &self,
        root: &Position,
        game_keys: &[u64],
        param: &SearchParam,
        report: &dyn Fn(SearchReport<'_>),
    ) -> SearchResult {
        self.stop.store(false, Ordering::Relaxed);

        let legal = root.legal_moves();
        if legal.is_empty() {
            // Terminal root: mate or stalemate, nothing to search.
            return SearchResult::default();
        }
        let num_pv_lines = param.num_pv_lines.clamp(1, legal.len());

        if !param.limits.analysis_mode {
            // Under a clock a forced move needs no evaluation.
            if param.limits.max_time.is_some() && legal.len() == 1 {
                debug!("single legal move, skipping search");
                return SearchResult {
                    lines: vec![PvLine {
                        moves: vec![legal[0]],
                        score: 0,
                    }],
                    depth: 0,
                    nodes: 0,
                    seldepth: 0,
                };
            }

            if param.use_root_tablebase && num_pv_lines == 1 {
                if let Some((mv, wdl)) = self.tablebase.probe_root(root) {
                    debug!(wdl, "root tablebase hit");
                    return SearchResult {
                        lines: vec![PvLine {
                            moves: vec![mv],
                            score: wdl * TABLEBASE_WIN,
                        }],
                        depth: 0,
                        nodes: 0,
                        seldepth: 0,
                    };
                }
            }
        }

        let stats = Stats::new();
        let num_threads = param.num_threads.max(1);
        let mut main_result = (Vec::new(), 0);

        std::thread::scope(|scope| {
            for thread_id in 1..num_threads {
                let stats = &stats;
                scope.spawn(move || {
                    let mut td = ThreadData::new(thread_id, game_keys);
                    let ctx = SearchContext {
                        tt: &self.tt,
                        stats,
                        stop: &self.stop,
                        limits: &param.limits,
                        params: &self.params,
                        evaluator: self.evaluator.as_ref(),
                        tablebase: self.tablebase.as_ref(),
                        is_ponder: param.is_ponder,
                        report: None,
                    };
                    let _ = iterative_deepening(&mut td, &ctx, root, num_pv_lines, &param.excluded_moves);
                });
            }

            // Thread 0 runs here on the caller's thread.
            let mut td = ThreadData::new(0, game_keys);
            let ctx = SearchContext {
                tt: &self.tt,
                stats: &stats,
                stop: &self.stop,
                limits: &param.limits,
                params: &self.params,
                evaluator: self.evaluator.as_ref(),
                tablebase: self.tablebase.as_ref(),
                is_ponder: param.is_ponder,
                report: Some(report),
            };
            main_result = iterative_deepening(&mut td, &ctx, root, num_pv_lines, &param.excluded_moves);

            // Main is done; release the helpers before the scope joins them.
            self.stop.store(true, Ordering::Relaxed);
        });

        let (lines, depth) = main_result;
        SearchResult {
            lines: lines.into_iter().filter(|l| !l.moves.is_empty()).collect(),
            depth,
            nodes: stats.nodes(),
            seldepth: stats.seldepth(),
        }
    }
}

impl std::fmt::Debug for Search {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search").field("tt", &self.tt).finish()
    }
}

/// One worker's iterative-deepening loop. Returns the PV lines of the
/// last completed iteration and the depth reached.
fn iterative_deepening(
    td: &mut ThreadData,
    ctx: &SearchContext<'_>,
    root: &Position,
    num_pv_lines: usize,
    excluded_moves: &[Move],
) -> (Vec<PvLine>, i32) {
    td.orderer.new_search();
    td.node_cache.on_new_search();
    td.prev_pv_lines = vec![PvLine::default(); num_pv_lines];

    let mut out_result = vec![PvLine::default(); num_pv_lines];
    let mut completed_depth = 0;
    let mut mate_counter = 0u32;
    let mut tm_state = TimeManagerState::default();
    let mut soft_time = ctx.limits.ideal_time_base;
    let mut prev_best = Move::NULL;

    'deepening: for depth in 1..=ctx.limits.max_depth {
        td.root_depth = depth;

        let mut iteration: Vec<PvLine> = Vec::with_capacity(num_pv_lines);
        let mut pv_moves_so_far: Vec<Move> = excluded_moves.to_vec();
        let mut finish_at_depth = false;

        for pv_index in 0..num_pv_lines {
            // Seed the aspiration window from the previous iteration, or
            // from the transposition table on the very first one.
            let mut prev_score = (!td.prev_pv_lines[pv_index].moves.is_empty())
                .then(|| td.prev_pv_lines[pv_index].score);
            if depth <= 1 && pv_index == 0 {
                if let Some(entry) = ctx.tt.read(root) {
                    prev_score = Some(entry.score_at(0, root.halfmove_clock()));
                }
            }

            let input = AspirationInput {
                depth,
                pv_index,
                prev_score,
                move_filter: &pv_moves_so_far,
            };
            let line = aspiration_search(td, ctx, root, &input);

            if (depth > 1 && ctx.check_stop(td, true)) || line.moves.is_empty() {
                finish_at_depth = true;
                break;
            }

            if td.is_main {
                out_result[pv_index] = line.clone();
            }

            if pv_index == 0 {
                if is_mate_score(line.score) {
                    mate_counter += 1;
                } else {
                    mate_counter = 0;
                }
            }

            pv_moves_so_far.push(line.moves[0]);
            iteration.push(line);
        }

        if finish_at_depth {
            if td.is_main {
                ctx.stop.store(true, Ordering::Relaxed);
            }
            break 'deepening;
        }

        completed_depth = depth;
        let best_move = iteration[0].moves[0];
        let best_score = iteration[0].score;

        if td.is_main && !ctx.is_ponder && !ctx.limits.analysis_mode {
            let fraction = td
                .node_cache
                .try_get(root.hash())
                .map_or(0.0, |e| e.node_fraction(best_move));
            if let Some(entry) = td.node_cache.get_or_alloc(root.hash(), 0) {
                entry.set_best_move(best_move);
            }

            let update = TimeUpdate {
                depth,
                best_move,
                prev_best_move: prev_best,
                best_move_node_fraction: fraction,
            };
            if let Some(budget) = update_ideal_time(&update, ctx.params, ctx.limits, &mut tm_state)
            {
                soft_time = Some(budget);
            }
        }
        prev_best = best_move;
        td.prev_pv_lines = iteration;

        // Soft budget is only consulted between depth iterations.
        if td.is_main && !ctx.is_ponder {
            if let Some(soft) = soft_time {
                if ctx.limits.elapsed() >= soft {
                    ctx.stop.store(true, Ordering::Relaxed);
                    break 'deepening;
                }
            }
        }

        // A mate confirmed over several depths will not change.
        if td.is_main
            && !ctx.is_ponder
            && !ctx.limits.analysis_mode
            && mate_counter >= ctx.params.mate_count_stop
            && ctx.limits.is_depth_unbounded()
        {
            ctx.stop.store(true, Ordering::Relaxed);
            break 'deepening;
        }

        // Root singularity: once time is invested, verify whether any
        // other root move comes close; if not, the decision is made.
        if td.is_main
            && num_pv_lines == 1
            && depth >= ctx.params.singular_depth_min
            && best_score.abs() < 1000
        {
            if let Some(singularity_time) = ctx.limits.root_singularity_time {
                if ctx.limits.elapsed() >= singularity_time {
                    let threshold = ctx.params.root_singularity_threshold_min.max(
                        ctx.params.root_singularity_threshold_max
                            - ctx.params.root_singularity_step
                                * (depth - ctx.params.singular_depth_min),
                    );
                    let singular_beta = best_score - threshold;
                    let filter = [best_move];
                    let mut node =
                        NodeInfo::root(*root, depth / 2, singular_beta - 1, singular_beta, 0, &filter);
                    node.is_pv_from_prev_iteration = false;
                    node.is_singular_search = true;

                    let score = negamax(td, ctx, &mut node);
                    if score < singular_beta || ctx.check_stop(td, true) {
                        debug!(depth, "root move is singular, stopping");
                        ctx.stop.store(true, Ordering::Relaxed);
                        break 'deepening;
                    }
                }
            }
        }
    }

    ctx.stats.append(&mut td.batch, true);
    (out_result, completed_depth)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::AtomicBool;

    use super::control::SearchLimits;
    use super::stats::Stats;
    use super::thread::ThreadData;
    use super::tt::TranspositionTable;
    use super::SearchContext;
    use crate::eval::MaterialEvaluator;
    use crate::params::Params;
    use crate::tablebase::NoTablebase;

    /// Owns everything a [`SearchContext`] borrows.
    pub(crate) struct ContextOwner {
        pub tt: TranspositionTable,
        pub stats: Stats,
        pub stop: AtomicBool,
        pub limits: SearchLimits,
        pub params: Params,
        pub evaluator: MaterialEvaluator,
        pub tablebase: NoTablebase,
    }

    impl ContextOwner {
        pub fn context(&self) -> SearchContext<'_> {
            SearchContext {
                tt: &self.tt,
                stats: &self.stats,
                stop: &self.stop,
                limits: &self.limits,
                params: &self.params,
                evaluator: &self.evaluator,
                tablebase: &self.tablebase,
                is_ponder: false,
                report: None,
            }
        }
    }

    pub(crate) struct SearchHarness {
        pub td: ThreadData,
        pub ctx: ContextOwner,
    }

    /// Single-thread harness for driving search internals in tests.
    pub(crate) fn search_harness(game_keys: &[u64]) -> SearchHarness {
        let mut td = ThreadData::new(0, game_keys);
        td.root_depth = 64;
        SearchHarness {
            td,
            ctx: ContextOwner {
                tt: TranspositionTable::with_entries(1 << 16),
                stats: Stats::new(),
                stop: AtomicBool::new(false),
                limits: SearchLimits::default(),
                params: Params::default(),
                evaluator: MaterialEvaluator,
                tablebase: NoTablebase,
            },
        }
    }
}
