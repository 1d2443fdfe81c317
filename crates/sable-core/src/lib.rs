//! Core chess types for the sable engine.
//!
//! Board representation and move generation come from the [`chess`] crate;
//! this crate wraps them in the engine's own `Position`, packed `Move`, and
//! score types.

mod moves;
mod position;
mod score;

pub use moves::{Move, PackedMove};
pub use position::{Position, PositionError};
pub use score::{
    is_mate_score, score_from_tt, score_to_tt, CHECKMATE, INF, INVALID_EVAL, KNOWN_WIN,
    MATE_THRESHOLD, MAX_PLY, MAX_SEARCH_DEPTH, TABLEBASE_WIN,
};

pub use chess::{Color, Piece, Square};
