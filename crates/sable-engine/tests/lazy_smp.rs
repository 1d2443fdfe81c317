//! Integration tests for lazy-SMP threading.
//!
//! Verifies correctness (legal moves, mate detection) and robustness
//! (stop-signal propagation, node accounting) across thread counts.

use std::sync::atomic::Ordering;

use sable_core::{Position, CHECKMATE};
use sable_engine::{Search, SearchLimits, SearchParam, SearchResult};

const SCHOLARS_MATE_FEN: &str = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";

fn search_with_threads(fen: &str, depth: i32, threads: usize) -> SearchResult {
    let pos = Position::from_fen(fen).unwrap();
    let search = Search::new(16);
    let param = SearchParam {
        num_threads: threads,
        limits: SearchLimits {
            max_depth: depth,
            ..Default::default()
        },
        ..Default::default()
    };
    search.run(&pos, &[], &param, &|_| {})
}

#[test]
fn two_threads_return_legal_move() {
    let result = search_with_threads(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        5,
        2,
    );
    let best = result.best_move().expect("2-thread search should find a move");
    let pos = Position::startpos();
    assert!(pos.legal_moves().contains(&best));
}

#[test]
fn four_threads_find_mate_in_one() {
    let result = search_with_threads(SCHOLARS_MATE_FEN, 3, 4);
    assert_eq!(result.best_move().unwrap().to_uci(), "h5f7");
    assert_eq!(result.score(), Some(CHECKMATE - 1));
}

#[test]
fn node_totals_reported_for_any_thread_count() {
    let single = search_with_threads(SCHOLARS_MATE_FEN, 6, 1);
    let quad = search_with_threads(SCHOLARS_MATE_FEN, 6, 4);
    assert!(single.nodes > 0);
    assert!(quad.nodes > 0);
    assert_eq!(quad.best_move().unwrap().to_uci(), "h5f7");
}

#[test]
fn various_positions_with_four_threads() {
    let positions = [
        ("Sicilian", "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2"),
        ("Ruy Lopez", "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3"),
        ("K+P endgame", "8/8/8/3k4/8/3K4/4P3/8 w - - 0 1"),
    ];
    for (name, fen) in positions {
        let result = search_with_threads(fen, 5, 4);
        assert!(result.best_move().is_some(), "{name} returned no move");
        let pos = Position::from_fen(fen).unwrap();
        assert!(
            pos.legal_moves().contains(&result.best_move().unwrap()),
            "{name} returned an illegal move"
        );
    }
}

#[test]
fn stop_signal_reaches_all_threads() {
    let pos = Position::startpos();
    let search = Search::new(16);
    let stop = search.stop_flag();

    let param = SearchParam {
        num_threads: 4,
        ..Default::default() // unbounded depth
    };
    let result = search.run(&pos, &[], &param, &|report| {
        if let sable_engine::SearchReport::Pv { depth, .. } = report {
            if depth >= 2 {
                stop.store(true, Ordering::Relaxed);
            }
        }
    });

    assert!(
        result.depth <= 3,
        "all threads should wind down quickly, main reached {}",
        result.depth
    );
    assert!(result.best_move().is_some());
}

#[test]
fn forced_move_shortcut_with_threads() {
    let pos = Position::from_fen("7k/5Q2/8/1p6/8/1P6/8/6K1 b - - 0 1").unwrap();
    let search = Search::new(1);
    let param = SearchParam {
        num_threads: 4,
        limits: SearchLimits {
            max_time: Some(std::time::Duration::from_millis(1)),
            ..Default::default()
        },
        ..Default::default()
    };
    let result = search.run(&pos, &[], &param, &|_| {});
    assert_eq!(result.best_move().unwrap().to_uci(), "b5b4");
    assert_eq!(result.nodes, 0);
}
