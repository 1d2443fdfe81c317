//! UCI protocol shell for the sable chess engine.

pub mod command;
pub mod engine;
pub mod error;

pub use command::{parse_command, Command, GamePosition, GoParams};
pub use engine::UciEngine;
pub use error::UciError;
