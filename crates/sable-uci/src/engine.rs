//! Event-driven, multi-threaded UCI engine.
//!
//! The main thread owns engine state and processes events from two
//! sources: a stdin reader thread and the search worker. Searches run on
//! their own thread and hand the [`Search`] coordinator back when done.

use std::io::{self, BufRead, Write};
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use tracing::{debug, info, warn};

use sable_core::{is_mate_score, Move, CHECKMATE, MAX_SEARCH_DEPTH};
use sable_engine::{
    init_limits, Bounds, Search, SearchLimits, SearchParam, SearchReport, SearchResult, TimeInput,
};

use crate::command::{parse_command, Command, GamePosition, GoParams};
use crate::error::UciError;

/// Values of the UCI-visible options.
#[derive(Debug, Clone)]
struct EngineOptions {
    threads: usize,
    hash_mb: usize,
    multi_pv: usize,
    ponder: bool,
    move_overhead: Duration,
    analyse_mode: bool,
    debug_log: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 16,
            multi_pv: 1,
            ponder: false,
            move_overhead: Duration::from_millis(10),
            analyse_mode: false,
            debug_log: true,
        }
    }
}

enum EngineState {
    Idle,
    Searching { ponder: bool },
}

/// Events processed by the main engine loop.
enum EngineEvent {
    UciCommand(Result<Command, UciError>),
    SearchDone(Box<SearchDone>),
    InputClosed,
}

/// Payload returned by the search thread when it finishes.
struct SearchDone {
    result: SearchResult,
    search: Search,
    root_in_check: bool,
}

/// The UCI engine: current game state, searcher, and option values.
pub struct UciEngine {
    game: GamePosition,
    /// `None` while a search thread owns the coordinator.
    search: Option<Search>,
    state: EngineState,
    options: EngineOptions,
    stop_flag: Option<Arc<AtomicBool>>,
    last_go: Option<GoParams>,
    /// Set on `ponderhit`: restart as a timed search when the ponder
    /// search comes back.
    pending_restart: Option<GoParams>,
    pending_clear_tt: bool,
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl UciEngine {
    /// Create a new engine with the starting position.
    pub fn new() -> Self {
        let options = EngineOptions::default();
        Self {
            game: GamePosition::default(),
            search: Some(Search::new(options.hash_mb)),
            state: EngineState::Idle,
            options,
            stop_flag: None,
            last_go: None,
            pending_restart: None,
            pending_clear_tt: false,
        }
    }

    /// Run the UCI event loop, reading stdin until `quit` or input closes.
    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<EngineEvent>();

        // Stdin reader thread.
        let stdin_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim().to_string();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!(cmd = %trimmed, "received UCI command");
                        if stdin_tx
                            .send(EngineEvent::UciCommand(parse_command(&trimmed)))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = stdin_tx.send(EngineEvent::InputClosed);
        });

        for event in &rx {
            match event {
                EngineEvent::UciCommand(Ok(cmd)) => match cmd {
                    Command::Uci => self.handle_uci(),
                    Command::IsReady => println!("readyok"),
                    Command::UciNewGame => self.handle_ucinewgame(),
                    Command::Position(game) => self.game = *game,
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::SetOption { name, value } => self.handle_setoption(&name, value),
                    Command::PonderHit => self.handle_ponderhit(),
                    Command::Stop => self.handle_stop(),
                    Command::Quit => {
                        if !matches!(self.state, EngineState::Idle) {
                            self.handle_stop();
                            for ev in &rx {
                                if let EngineEvent::SearchDone(done) = ev {
                                    self.finish_search(*done, &tx);
                                    break;
                                }
                            }
                        }
                        break;
                    }
                    Command::Unknown(_) => {}
                },
                EngineEvent::UciCommand(Err(e)) => {
                    warn!(error = %e, "UCI parse error");
                }
                EngineEvent::SearchDone(done) => self.finish_search(*done, &tx),
                EngineEvent::InputClosed => break,
            }
        }

        info!("sable shutting down");
        Ok(())
    }

    fn handle_uci(&self) {
        println!("id name sable");
        println!("id author the sable authors");
        println!("option name Threads type spin default 1 min 1 max 256");
        println!("option name Hash type spin default 16 min 1 max 4096");
        println!("option name MultiPV type spin default 1 min 1 max 256");
        println!("option name Ponder type check default false");
        println!("option name MoveOverhead type spin default 10 min 0 max 1000");
        println!("option name UCI_AnalyseMode type check default false");
        println!("option name DebugLog type check default true");
        println!("uciok");
    }

    fn handle_ucinewgame(&mut self) {
        self.game = GamePosition::default();
        if let Some(search) = &self.search {
            search.clear();
        } else {
            // Search thread owns the coordinator -- clear when it returns.
            self.pending_clear_tt = true;
        }
    }

    fn handle_setoption(&mut self, name: &str, value: Option<String>) {
        let value = value.unwrap_or_default();
        match name {
            "Threads" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.options.threads = n.clamp(1, 256);
                }
            }
            "Hash" => {
                if let Ok(mb) = value.parse::<usize>() {
                    self.options.hash_mb = mb.clamp(1, 4096);
                    if let Some(search) = &mut self.search {
                        search.resize_tt(self.options.hash_mb);
                    }
                }
            }
            "MultiPV" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.options.multi_pv = n.clamp(1, 256);
                }
            }
            "Ponder" => self.options.ponder = value == "true",
            "MoveOverhead" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.options.move_overhead = Duration::from_millis(ms.min(1000));
                }
            }
            "UCI_AnalyseMode" => self.options.analyse_mode = value == "true",
            "DebugLog" => self.options.debug_log = value == "true",
            _ => warn!(option = name, "unknown option"),
        }
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<EngineEvent>) {
        if !matches!(self.state, EngineState::Idle) {
            warn!("go received while searching, ignoring");
            return;
        }
        let Some(search) = self.search.take() else {
            warn!("searcher unavailable");
            return;
        };

        self.last_go = Some(params.clone());

        let side = self.game.position.side_to_move();
        let (remaining, increment) = match side {
            sable_core::Color::White => (params.wtime, params.winc),
            sable_core::Color::Black => (params.btime, params.binc),
        };

        let mut limits = SearchLimits {
            max_depth: params
                .depth
                .unwrap_or(MAX_SEARCH_DEPTH)
                .clamp(1, MAX_SEARCH_DEPTH),
            max_nodes: params.nodes,
            analysis_mode: self.options.analyse_mode,
            ..Default::default()
        };

        if !params.infinite {
            let input = TimeInput {
                remaining,
                increment: increment.unwrap_or(Duration::ZERO),
                moves_to_go: params.movestogo,
                move_time: params.movetime,
                move_overhead: self.options.move_overhead,
            };
            init_limits(
                self.game.position.move_number() as u32,
                &input,
                search.params(),
                &mut limits,
            );
        }

        let search_param = SearchParam {
            limits,
            num_pv_lines: self.options.multi_pv,
            num_threads: self.options.threads,
            is_ponder: params.ponder,
            use_root_tablebase: true,
            excluded_moves: Vec::new(),
        };

        self.stop_flag = Some(search.stop_flag());
        self.state = EngineState::Searching {
            ponder: params.ponder,
        };

        let game = self.game.clone();
        let tx = tx.clone();
        let debug_log = self.options.debug_log;
        let multi_pv = self.options.multi_pv;

        std::thread::spawn(move || {
            let root_in_check = game.position.is_in_check();
            let report = |r: SearchReport<'_>| {
                if debug_log {
                    print_report(&r, multi_pv);
                }
            };
            let result = search.run(&game.position, &game.key_history, &search_param, &report);
            let _ = tx.send(EngineEvent::SearchDone(Box::new(SearchDone {
                result,
                search,
                root_in_check,
            })));
        });
    }

    fn handle_ponderhit(&mut self) {
        if let EngineState::Searching { ponder: true } = self.state {
            // Restart the same go as a normal timed search on a warm
            // table once the ponder search unwinds.
            if let Some(mut params) = self.last_go.clone() {
                params.ponder = false;
                self.pending_restart = Some(params);
            }
            self.handle_stop();
        }
    }

    fn handle_stop(&mut self) {
        if let Some(stop) = &self.stop_flag {
            stop.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    }

    fn finish_search(&mut self, done: SearchDone, tx: &mpsc::Sender<EngineEvent>) {
        self.search = Some(done.search);
        self.state = EngineState::Idle;
        self.stop_flag = None;

        if self.pending_clear_tt {
            self.pending_clear_tt = false;
            if let Some(search) = &self.search {
                search.clear();
            }
        }

        // Ponderhit: do not report the aborted ponder search, run for real.
        if let Some(params) = self.pending_restart.take() {
            self.handle_go(params, tx);
            return;
        }

        match done.result.best_move() {
            Some(best) => {
                match done.result.ponder_move() {
                    Some(ponder) => println!("bestmove {best} ponder {ponder}"),
                    None => println!("bestmove {best}"),
                }
            }
            None => {
                // Terminal root: report the verdict, then a null move.
                if self.options.debug_log {
                    if done.root_in_check {
                        println!("info depth 0 score mate 0");
                    } else {
                        println!("info depth 0 score cp 0");
                    }
                }
                println!("bestmove (none)");
            }
        }
        let _ = io::stdout().flush();
    }
}

/// Convert an internal score to UCI `cp`/`mate` notation.
fn format_score(score: i32) -> String {
    if is_mate_score(score) {
        let moves = (CHECKMATE - score.abs() + 1) / 2;
        if score > 0 {
            format!("mate {moves}")
        } else {
            format!("mate -{moves}")
        }
    } else {
        format!("cp {score}")
    }
}

fn format_pv(pv: &[Move]) -> String {
    pv.iter()
        .map(|m| m.to_uci())
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_report(report: &SearchReport<'_>, multi_pv: usize) {
    match report {
        SearchReport::Pv {
            depth,
            seldepth,
            pv_index,
            score,
            bounds,
            nodes,
            time,
            pv,
        } => {
            let mut line = format!("info depth {depth} seldepth {seldepth}");
            if multi_pv > 1 {
                line.push_str(&format!(" multipv {}", pv_index + 1));
            }
            line.push_str(&format!(" score {}", format_score(*score)));
            match bounds {
                Bounds::Lower => line.push_str(" lowerbound"),
                Bounds::Upper => line.push_str(" upperbound"),
                _ => {}
            }
            line.push_str(&format!(" nodes {nodes}"));
            let millis = time.as_millis();
            if millis > 10 && *nodes > 100 {
                let nps = *nodes as u128 * 1000 / millis;
                line.push_str(&format!(" nps {nps}"));
            }
            line.push_str(&format!(" time {millis}"));
            if !pv.is_empty() {
                line.push_str(&format!(" pv {}", format_pv(pv)));
            }
            println!("{line}");
            let _ = io::stdout().flush();
        }
        SearchReport::CurrentMove { depth, mv, number } => {
            println!("info depth {depth} currmove {mv} currmovenumber {number}");
            let _ = io::stdout().flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centipawn_scores_format_as_cp() {
        assert_eq!(format_score(0), "cp 0");
        assert_eq!(format_score(123), "cp 123");
        assert_eq!(format_score(-450), "cp -450");
    }

    #[test]
    fn mate_scores_format_with_move_counts() {
        // Mate in 1 ply = mate in 1 move.
        assert_eq!(format_score(CHECKMATE - 1), "mate 1");
        // Mate in 3 plies = 2 of our moves.
        assert_eq!(format_score(CHECKMATE - 3), "mate 2");
        assert_eq!(format_score(CHECKMATE - 4), "mate 2");
        // Getting mated.
        assert_eq!(format_score(-(CHECKMATE - 2)), "mate -1");
        assert_eq!(format_score(-(CHECKMATE - 5)), "mate -3");
    }

    #[test]
    fn pv_formats_as_space_separated_uci() {
        let pos = sable_core::Position::startpos();
        let e4 = pos.parse_uci_move("e2e4").unwrap();
        let pv = [e4];
        assert_eq!(format_pv(&pv), "e2e4");
    }
}
