//! UCI command parsing.

use std::time::Duration;

use sable_core::Position;

use crate::error::UciError;

/// A position plus the Zobrist keys of everything played before it, for
/// repetition detection inside the search.
#[derive(Debug, Clone)]
pub struct GamePosition {
    pub position: Position,
    /// Keys of prior positions, oldest first.
    pub key_history: Vec<u64>,
}

impl Default for GamePosition {
    fn default() -> Self {
        Self {
            position: Position::startpos(),
            key_history: Vec::new(),
        }
    }
}

/// Parameters for the `go` command.
///
/// All fields are optional; a bare `go` searches without limits.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    /// White's remaining time.
    pub wtime: Option<Duration>,
    /// Black's remaining time.
    pub btime: Option<Duration>,
    /// White's increment per move.
    pub winc: Option<Duration>,
    /// Black's increment per move.
    pub binc: Option<Duration>,
    /// Moves until next time control.
    pub movestogo: Option<u32>,
    /// Search to this depth only.
    pub depth: Option<i32>,
    /// Search for exactly this duration.
    pub movetime: Option<Duration>,
    /// Search this many nodes only.
    pub nodes: Option<u64>,
    /// Search until `stop` (no time limit).
    pub infinite: bool,
    /// Search in pondering mode.
    pub ponder: bool,
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- reset engine state.
    UciNewGame,
    /// `position` -- set up a position with optional moves applied.
    Position(Box<GamePosition>),
    /// `go` -- start searching with given parameters.
    Go(GoParams),
    /// `setoption name <name> [value <value>]`.
    SetOption {
        name: String,
        value: Option<String>,
    },
    /// `ponderhit` -- opponent played the expected move during pondering.
    PonderHit,
    /// `stop` -- halt the current search.
    Stop,
    /// `quit` -- exit the engine.
    Quit,
    /// Unrecognized command (silently ignored per UCI convention).
    Unknown(String),
}

/// Parse a single line of UCI input into a [`Command`].
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        "ponderhit" => Ok(Command::PonderHit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "setoption" => parse_setoption(&tokens[1..]),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Parse the `position` command arguments.
///
/// Supports:
/// - `position startpos [moves e2e4 d7d5 ...]`
/// - `position fen <fen-string> [moves e2e4 d7d5 ...]`
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (position, rest) = if tokens[0] == "startpos" {
        (Position::startpos(), &tokens[1..])
    } else if tokens[0] == "fen" {
        // FEN runs until the optional "moves" keyword.
        let fen_end = tokens
            .iter()
            .position(|t| *t == "moves")
            .unwrap_or(tokens.len());
        let fen = tokens[1..fen_end].join(" ");
        (Position::from_fen(&fen)?, &tokens[fen_end..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    let mut game = GamePosition {
        position,
        key_history: Vec::new(),
    };

    if !rest.is_empty() && rest[0] == "moves" {
        for uci_str in &rest[1..] {
            let mv = game
                .position
                .parse_uci_move(uci_str)
                .ok_or_else(|| UciError::InvalidMove {
                    uci_move: uci_str.to_string(),
                })?;
            game.key_history.push(game.position.hash());
            game.position = game.position.do_move(mv);
        }
    }

    Ok(Command::Position(Box::new(game)))
}

/// Parse the `go` command arguments.
///
/// Supports: wtime, btime, winc, binc, movestogo, depth, movetime,
/// nodes, infinite, ponder. Unknown tokens are silently skipped.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "wtime" => {
                params.wtime = Some(parse_millis(tokens.get(i + 1), "wtime")?);
                i += 2;
            }
            "btime" => {
                params.btime = Some(parse_millis(tokens.get(i + 1), "btime")?);
                i += 2;
            }
            "winc" => {
                params.winc = Some(parse_millis(tokens.get(i + 1), "winc")?);
                i += 2;
            }
            "binc" => {
                params.binc = Some(parse_millis(tokens.get(i + 1), "binc")?);
                i += 2;
            }
            "movestogo" => {
                params.movestogo = Some(parse_int(tokens.get(i + 1), "movestogo")?);
                i += 2;
            }
            "depth" => {
                params.depth = Some(parse_int(tokens.get(i + 1), "depth")?);
                i += 2;
            }
            "movetime" => {
                params.movetime = Some(parse_millis(tokens.get(i + 1), "movetime")?);
                i += 2;
            }
            "nodes" => {
                params.nodes = Some(parse_int(tokens.get(i + 1), "nodes")?);
                i += 2;
            }
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            _ => {
                // Unknown token -- skip per UCI convention.
                i += 1;
            }
        }
    }

    Ok(Command::Go(params))
}

/// Parse `setoption name <words...> [value <words...>]`.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.first() != Some(&"name") {
        return Err(UciError::MissingOptionName);
    }

    let value_pos = tokens.iter().position(|t| *t == "value");
    let name_end = value_pos.unwrap_or(tokens.len());
    let name = tokens[1..name_end].join(" ");
    if name.is_empty() {
        return Err(UciError::MissingOptionName);
    }

    let value = value_pos.map(|p| tokens[p + 1..].join(" "));

    Ok(Command::SetOption { name, value })
}

fn parse_millis(token: Option<&&str>, param: &str) -> Result<Duration, UciError> {
    let value = token.ok_or_else(|| UciError::MissingGoValue {
        param: param.to_string(),
    })?;
    // Some GUIs send negative clocks when flagging; clamp to zero.
    let ms: i64 = value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })?;
    Ok(Duration::from_millis(ms.max(0) as u64))
}

fn parse_int<T: std::str::FromStr>(token: Option<&&str>, param: &str) -> Result<T, UciError> {
    let value = token.ok_or_else(|| UciError::MissingGoValue {
        param: param.to_string(),
    })?;
    value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert!(matches!(parse_command("uci"), Ok(Command::Uci)));
        assert!(matches!(parse_command("isready"), Ok(Command::IsReady)));
        assert!(matches!(parse_command("stop"), Ok(Command::Stop)));
        assert!(matches!(parse_command("quit"), Ok(Command::Quit)));
        assert!(matches!(parse_command("ponderhit"), Ok(Command::PonderHit)));
        assert!(matches!(parse_command("banana"), Ok(Command::Unknown(_))));
        assert!(matches!(parse_command(""), Ok(Command::Unknown(_))));
    }

    #[test]
    fn parses_startpos_with_moves() {
        let cmd = parse_command("position startpos moves e2e4 e7e5 g1f3").unwrap();
        let Command::Position(game) = cmd else {
            panic!("expected position command");
        };
        assert_eq!(game.key_history.len(), 3);
        assert_eq!(game.position.move_number(), 2);
    }

    #[test]
    fn parses_fen_position() {
        let cmd =
            parse_command("position fen 6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 3 30 moves a1a8").unwrap();
        let Command::Position(game) = cmd else {
            panic!("expected position command");
        };
        assert_eq!(game.key_history.len(), 1);
        assert!(game.position.is_in_check());
    }

    #[test]
    fn rejects_bad_positions() {
        assert!(matches!(
            parse_command("position"),
            Err(UciError::MalformedPosition)
        ));
        assert!(matches!(
            parse_command("position fen not/a/fen"),
            Err(UciError::Position(_))
        ));
        assert!(matches!(
            parse_command("position startpos moves e2e5"),
            Err(UciError::InvalidMove { .. })
        ));
    }

    #[test]
    fn parses_go_with_clock() {
        let cmd = parse_command("go wtime 60000 btime 55000 winc 1000 binc 1000 movestogo 20")
            .unwrap();
        let Command::Go(params) = cmd else {
            panic!("expected go command");
        };
        assert_eq!(params.wtime, Some(Duration::from_secs(60)));
        assert_eq!(params.btime, Some(Duration::from_secs(55)));
        assert_eq!(params.winc, Some(Duration::from_secs(1)));
        assert_eq!(params.movestogo, Some(20));
        assert!(!params.infinite);
    }

    #[test]
    fn parses_go_depth_nodes_movetime() {
        let cmd = parse_command("go depth 12 nodes 100000 movetime 2500").unwrap();
        let Command::Go(params) = cmd else {
            panic!("expected go command");
        };
        assert_eq!(params.depth, Some(12));
        assert_eq!(params.nodes, Some(100_000));
        assert_eq!(params.movetime, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn parses_go_infinite_and_ponder() {
        let Command::Go(params) = parse_command("go infinite").unwrap() else {
            panic!();
        };
        assert!(params.infinite);

        let Command::Go(params) = parse_command("go ponder wtime 1000 btime 1000").unwrap() else {
            panic!();
        };
        assert!(params.ponder);
    }

    #[test]
    fn negative_clock_clamps_to_zero() {
        let Command::Go(params) = parse_command("go wtime -50 btime 1000").unwrap() else {
            panic!();
        };
        assert_eq!(params.wtime, Some(Duration::ZERO));
    }

    #[test]
    fn rejects_missing_go_values() {
        assert!(matches!(
            parse_command("go wtime"),
            Err(UciError::MissingGoValue { .. })
        ));
        assert!(matches!(
            parse_command("go depth twelve"),
            Err(UciError::InvalidGoValue { .. })
        ));
    }

    #[test]
    fn parses_setoption() {
        let Command::SetOption { name, value } =
            parse_command("setoption name Hash value 128").unwrap()
        else {
            panic!();
        };
        assert_eq!(name, "Hash");
        assert_eq!(value.as_deref(), Some("128"));

        let Command::SetOption { name, value } =
            parse_command("setoption name Move Overhead value 30").unwrap()
        else {
            panic!();
        };
        assert_eq!(name, "Move Overhead");
        assert_eq!(value.as_deref(), Some("30"));

        let Command::SetOption { name, value } =
            parse_command("setoption name Ponder").unwrap()
        else {
            panic!();
        };
        assert_eq!(name, "Ponder");
        assert!(value.is_none());

        assert!(matches!(
            parse_command("setoption value 5"),
            Err(UciError::MissingOptionName)
        ));
    }
}
