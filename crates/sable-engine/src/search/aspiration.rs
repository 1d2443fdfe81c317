//! Aspiration-window driver.
//!
//! Searches the root inside a narrow window centered on the previous
//! iteration's score and widens on failure. Fail-highs may re-search one
//! ply shallower when the attempt already overshot the requested depth;
//! widths past the maximum fall back to the full window.

use sable_core::{is_mate_score, Move, CHECKMATE, INF};

use crate::search::negamax::{negamax, NodeInfo};
use crate::search::thread::ThreadData;
use crate::search::tt::Bounds;
use crate::search::{PvLine, SearchContext, SearchReport};

pub(crate) struct AspirationInput<'a> {
    pub depth: i32,
    pub pv_index: usize,
    pub prev_score: Option<i32>,
    /// Root moves excluded from this line (multi-PV).
    pub move_filter: &'a [Move],
}

/// Run one depth iteration of one PV line. Returns the last *complete*
/// result; attempts cut short by the stop flag are discarded.
pub(crate) fn aspiration_search(
    td: &mut ThreadData,
    ctx: &SearchContext<'_>,
    root: &sable_core::Position,
    input: &AspirationInput<'_>,
) -> PvLine {
    let params = ctx.params;

    let mut alpha = -INF;
    let mut beta = INF;
    let mut depth = input.depth;

    // Narrower windows at higher depth, wider around large scores.
    let mut window = params.aspiration_window_start
        - (input.depth - params.aspiration_depth_start) * params.aspiration_window_step;
    window = window.max(params.aspiration_window_end);
    if let Some(prev) = input.prev_score {
        window += prev.abs() / 10;
    }

    if input.depth >= params.aspiration_depth_start {
        if let Some(prev) = input.prev_score {
            if !is_mate_score(prev) && !ctx.check_stop(td, true) {
                alpha = (prev - window).max(-INF);
                beta = (prev + window).min(INF);
            }
        }
    }

    let max_pv_len = if ctx.limits.analysis_mode {
        usize::MAX
    } else {
        (input.depth.max(1) as usize).min(params.max_pv_line_length)
    };

    let mut final_line = PvLine::default();

    loop {
        let mut node = NodeInfo::root(*root, depth, alpha, beta, input.pv_index, input.move_filter);
        let mut score = negamax(td, ctx, &mut node);
        debug_assert!((-CHECKMATE..=CHECKMATE).contains(&score) || ctx.check_stop(td, true));

        let mut line = PvLine {
            moves: td.pv.line(0).iter().take(max_pv_len).copied().collect(),
            score,
        };

        ctx.stats.append(&mut td.batch, true);

        window = 2 * window + 5;
        if window > params.aspiration_window_max {
            window = CHECKMATE;
        }

        let mut bounds = Bounds::Exact;
        if score <= alpha {
            // Fail low: report the bound, then drop alpha. Beta is pulled
            // toward the midpoint on purpose; in rare fail-low chains the
            // midpoint can cross zero, and that behavior is load-bearing
            // for matching tuned play — do not "fix" it.
            score = alpha;
            line.score = score;
            beta = (alpha + beta + 1) / 2;
            alpha = (score - window).max(-CHECKMATE);
            bounds = Bounds::Upper;
        } else if score >= beta {
            score = beta;
            line.score = score;
            beta = (beta + window).min(CHECKMATE);
            bounds = Bounds::Lower;

            // Re-search a touch shallower once the attempt overshot the
            // target depth far enough.
            if depth > params.aspiration_depth_start && depth + 3 > input.depth {
                depth -= 1;
            }
        }

        let stopped = input.depth > 1 && ctx.check_stop(td, true);

        if let Some(report) = ctx.report {
            report(SearchReport::Pv {
                depth: input.depth,
                seldepth: ctx.stats.seldepth(),
                pv_index: input.pv_index,
                score: line.score,
                bounds,
                nodes: ctx.stats.nodes(),
                time: ctx.limits.elapsed(),
                pv: &line.moves,
            });
        }

        // An interrupted attempt searched only part of the move list; its
        // line must not replace the last complete one.
        if !stopped {
            final_line = line;
        }

        if bounds == Bounds::Exact || stopped {
            break;
        }
    }

    final_line
}
