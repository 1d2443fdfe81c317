use criterion::{criterion_group, criterion_main, Criterion};

use sable_core::Position;
use sable_engine::{Search, SearchLimits, SearchParam};

const MIDDLEGAME_FEN: &str = "r1bq1rk1/pp2bppp/2n2n2/2pp4/3P4/2N1PN2/PP2BPPP/R1BQ1RK1 w - - 0 8";

fn fixed_depth_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    for (name, fen, depth) in [
        ("startpos_d6", "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 6),
        ("middlegame_d6", MIDDLEGAME_FEN, 6),
        ("endgame_d8", "8/8/4k3/8/2p5/2K5/2P5/8 w - - 0 1", 8),
    ] {
        let pos = Position::from_fen(fen).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                let search = Search::new(32);
                let param = SearchParam {
                    limits: SearchLimits {
                        max_depth: depth,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                search.run(&pos, &[], &param, &|_| {})
            })
        });
    }

    group.finish();
}

criterion_group!(benches, fixed_depth_search);
criterion_main!(benches);
