//! Endgame tablebase interface.
//!
//! The search only consumes win/draw/loss information; file formats and
//! probing code live behind this trait.

use sable_core::{Move, Position};

/// Endgame tablebase probes consumed by the search.
pub trait TablebaseProber: Send + Sync {
    /// Win/draw/loss for the side to move: `1`, `0`, or `-1`.
    /// `None` when the position is not covered.
    fn probe_wdl(&self, pos: &Position) -> Option<i32>;

    /// Best root move with its WDL value, when the root is covered.
    fn probe_root(&self, pos: &Position) -> Option<(Move, i32)>;
}

/// Default prober: no tablebases installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTablebase;

impl TablebaseProber for NoTablebase {
    fn probe_wdl(&self, _pos: &Position) -> Option<i32> {
        None
    }

    fn probe_root(&self, _pos: &Position) -> Option<(Move, i32)> {
        None
    }
}
