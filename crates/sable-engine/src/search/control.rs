//! Search limits and cooperative stop control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sable_core::MAX_SEARCH_DEPTH;

/// Hard and soft bounds on one search.
///
/// `max_depth`, `max_nodes` and `max_time` are hard limits enforced inside
/// the tree; `ideal_time_base` seeds the soft budget the time manager
/// rescales between depth iterations.
#[derive(Debug, Clone)]
pub struct SearchLimits {
    pub max_depth: i32,
    pub max_nodes: Option<u64>,
    pub max_time: Option<Duration>,
    /// Soft budget before per-depth rescaling.
    pub ideal_time_base: Option<Duration>,
    /// Elapsed time after which the root-singularity check is armed.
    pub root_singularity_time: Option<Duration>,
    /// increment / remaining time, for the time-manager node-fraction scale.
    pub increment_ratio: f64,
    /// `go movetime` — the soft budget is pinned and never rescaled.
    pub fixed_move_time: bool,
    /// Analysis mode disables the single-reply shortcut and PV-length cap.
    pub analysis_mode: bool,
    pub start_time: Instant,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_depth: MAX_SEARCH_DEPTH,
            max_nodes: None,
            max_time: None,
            ideal_time_base: None,
            root_singularity_time: None,
            increment_ratio: 0.0,
            fixed_move_time: false,
            analysis_mode: false,
            start_time: Instant::now(),
        }
    }
}

impl SearchLimits {
    /// Time since the search started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Whether the search depth is unbounded (no explicit `go depth`).
    #[inline]
    pub fn is_depth_unbounded(&self) -> bool {
        self.max_depth >= MAX_SEARCH_DEPTH
    }
}

/// Decide whether a thread must unwind.
///
/// The stop flag is shared and read relaxed; node and hard-time limits
/// promote themselves into the flag so every other thread observes the
/// decision. The clock is only consulted at root nodes and every 256
/// locally counted nodes — `stop_search()` is therefore observed within a
/// bounded number of nodes.
pub(crate) fn check_stop(
    stop: &AtomicBool,
    limits: &SearchLimits,
    is_ponder: bool,
    global_nodes: u64,
    local_nodes: u64,
    is_root_node: bool,
) -> bool {
    if stop.load(Ordering::Relaxed) {
        return true;
    }

    // Pondering ignores every limit until ponderhit rearms the clock.
    if is_ponder {
        return false;
    }

    if let Some(max_nodes) = limits.max_nodes {
        if global_nodes > max_nodes {
            stop.store(true, Ordering::Relaxed);
            return true;
        }
    }

    if is_root_node || local_nodes % 256 == 0 {
        if let Some(max_time) = limits.max_time {
            if limits.elapsed() >= max_time {
                stop.store(true, Ordering::Relaxed);
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_wins_immediately() {
        let stop = AtomicBool::new(true);
        let limits = SearchLimits::default();
        assert!(check_stop(&stop, &limits, false, 0, 1, false));
    }

    #[test]
    fn node_limit_sets_flag() {
        let stop = AtomicBool::new(false);
        let limits = SearchLimits {
            max_nodes: Some(1000),
            ..Default::default()
        };
        assert!(!check_stop(&stop, &limits, false, 999, 1, false));
        assert!(check_stop(&stop, &limits, false, 1001, 1, false));
        assert!(stop.load(Ordering::Relaxed), "node limit should latch the flag");
    }

    #[test]
    fn time_limit_checked_periodically() {
        let stop = AtomicBool::new(false);
        let limits = SearchLimits {
            max_time: Some(Duration::ZERO),
            ..Default::default()
        };
        // Off-period local node count skips the clock entirely.
        assert!(!check_stop(&stop, &limits, false, 0, 7, false));
        // On-period (multiple of 256) sees the expired clock.
        assert!(check_stop(&stop, &limits, false, 0, 512, false));
    }

    #[test]
    fn root_nodes_always_check_the_clock() {
        let stop = AtomicBool::new(false);
        let limits = SearchLimits {
            max_time: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(check_stop(&stop, &limits, false, 0, 7, true));
    }

    #[test]
    fn ponder_ignores_limits_but_not_flag() {
        let stop = AtomicBool::new(false);
        let limits = SearchLimits {
            max_time: Some(Duration::ZERO),
            max_nodes: Some(0),
            ..Default::default()
        };
        assert!(!check_stop(&stop, &limits, true, 100, 512, true));
        stop.store(true, Ordering::Relaxed);
        assert!(check_stop(&stop, &limits, true, 0, 1, false));
    }
}
