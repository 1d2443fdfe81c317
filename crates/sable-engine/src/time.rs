//! Time management.
//!
//! Converts clock state into a soft (ideal) and hard (maximum) budget
//! before the search starts, then rescales the soft budget between depth
//! iterations from best-move stability and the fraction of nodes spent on
//! the best root move.

use std::time::Duration;

use tracing::debug;

use sable_core::Move;

use crate::params::Params;
use crate::search::control::SearchLimits;

/// Clock state handed to [`init_limits`].
#[derive(Debug, Clone, Default)]
pub struct TimeInput {
    /// Remaining time on the engine's clock.
    pub remaining: Option<Duration>,
    /// Increment per move.
    pub increment: Duration,
    /// Moves until the next time control.
    pub moves_to_go: Option<u32>,
    /// Fixed time for this move (`go movetime`).
    pub move_time: Option<Duration>,
    /// Communication overhead reserved per move.
    pub move_overhead: Duration,
}

/// Expected number of moves still to be played, from the current move
/// number. The curve comes from LeelaChessZero's time manager.
pub fn estimate_moves_left(move_number: u32, params: &Params) -> f64 {
    let mid = params.tm_moves_left_midpoint;
    let steepness = params.tm_moves_left_steepness;
    let m = move_number as f64;
    mid * (1.0 + 1.5 * (m / mid).powf(steepness)).powf(1.0 / steepness) - m
}

/// Fill the time fields of `limits` from the clock.
///
/// With a running clock:
/// - `ideal = factor * (remaining / moves_left + increment)`
/// - `max = (remaining - overhead) / sqrt(moves_left) + increment`
///
/// both clamped so a single move can never consume more than half the
/// remaining clock. The root-singularity check is armed at a fraction of
/// the ideal time. A fixed `movetime` pins both budgets instead.
pub fn init_limits(move_number: u32, input: &TimeInput, params: &Params, limits: &mut SearchLimits) {
    let overhead_ms = input.move_overhead.as_secs_f64() * 1000.0;

    if let Some(remaining) = input.remaining {
        let remaining_ms = remaining.as_secs_f64() * 1000.0;
        let inc_ms = input.increment.as_secs_f64() * 1000.0;

        let moves_left = match input.moves_to_go {
            Some(mtg) => mtg.max(1) as f64,
            None => estimate_moves_left(move_number, params).max(1.0),
        };

        let ceiling = (0.5 * remaining_ms - overhead_ms).max(0.00001);
        let ideal_ms =
            (params.tm_ideal_factor * (remaining_ms / moves_left + inc_ms)).clamp(0.0, ceiling);
        let max_ms =
            ((remaining_ms - overhead_ms) / moves_left.sqrt() + inc_ms).clamp(0.0, ceiling);

        debug!(ideal_ms, max_ms, moves_left, "time budgets");

        limits.ideal_time_base = Some(Duration::from_secs_f64(ideal_ms / 1000.0));
        limits.max_time = Some(Duration::from_secs_f64(max_ms / 1000.0));
        limits.root_singularity_time = Some(Duration::from_secs_f64(
            ideal_ms * params.tm_singularity_fraction / 1000.0,
        ));
        limits.increment_ratio = if remaining_ms > 0.0 {
            inc_ms / remaining_ms
        } else {
            0.0
        };
        limits.fixed_move_time = false;
    }

    if let Some(move_time) = input.move_time {
        limits.ideal_time_base = Some(move_time);
        limits.max_time = Some(move_time);
        limits.fixed_move_time = true;
    }
}

/// Mutable state the per-depth update carries between iterations.
#[derive(Debug, Default)]
pub struct TimeManagerState {
    /// Consecutive depths with an unchanged best move.
    pub stability: u32,
}

/// Inputs for the per-depth soft-budget update.
#[derive(Debug, Clone, Copy)]
pub struct TimeUpdate {
    pub depth: i32,
    pub best_move: Move,
    pub prev_best_move: Move,
    /// Fraction of root nodes spent on the current best move.
    pub best_move_node_fraction: f64,
}

/// Rescale the soft budget after a completed depth.
///
/// Returns the new soft budget, or `None` to keep the previous one
/// (shallow depth, fixed move time, or no clock at all).
pub fn update_ideal_time(
    data: &TimeUpdate,
    params: &Params,
    limits: &SearchLimits,
    state: &mut TimeManagerState,
) -> Option<Duration> {
    let base = limits.ideal_time_base?;
    if limits.fixed_move_time || data.depth < params.tm_update_min_depth {
        return None;
    }

    if !data.prev_best_move.is_null() && data.best_move == data.prev_best_move {
        state.stability += 1;
    } else {
        state.stability = 0;
    }

    // Spending most of the tree on the best move means the decision is
    // settled; a flat distribution keeps the full budget.
    let t = (limits.increment_ratio / params.tm_inc_ratio_full).clamp(0.0, 1.0);
    let scale =
        params.tm_nodes_scale_no_inc + (params.tm_nodes_scale_inc - params.tm_nodes_scale_no_inc) * t;
    let node_factor = (1.0 - data.best_move_node_fraction) * scale + params.tm_nodes_offset;

    let stability_factor = params.tm_stability_offset
        - params.tm_stability_scale * state.stability.min(params.tm_stability_max) as f64;

    let factor = (node_factor * stability_factor).max(0.0);
    debug!(node_factor, stability_factor, "soft budget rescale");

    Some(base.mul_f64(factor))
}
