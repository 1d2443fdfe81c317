//! Quiescence search.
//!
//! Negamax restricted to tactical moves (all moves while in check) so the
//! static evaluation is only trusted in quiet positions. Depth counts down
//! below zero here; it only drives the move-count cutoffs.

use sable_core::{Move, Position, CHECKMATE, INF, KNOWN_WIN, MAX_PLY};

use crate::search::negamax::{evaluate, tt_hints, NodeInfo};
use crate::search::ordering::{MovePicker, GOOD_CAPTURE};
use crate::search::see::see_ge;
use crate::search::thread::ThreadData;
use crate::search::tt::{write_entry, Bounds, NUM_TT_MOVES};
use crate::search::SearchContext;

pub(crate) fn qsearch(td: &mut ThreadData, ctx: &SearchContext<'_>, node: &mut NodeInfo<'_>) -> i32 {
    debug_assert!(node.alpha < node.beta);
    debug_assert!(node.move_filter.is_empty());

    let is_pv = node.is_pv();
    td.pv.clear_ply(node.ply);

    td.batch.nodes += 1;
    td.batch.quiescence_nodes += 1;
    td.batch.max_depth = td.batch.max_depth.max(node.ply as u32 + 1);
    td.total_nodes += 1;
    ctx.stats.append(&mut td.batch, false);

    // Repetition and 50-move draws are not checked below the horizon: the
    // path state is not threaded down here, so only the material draw is
    // visible. Perpetual-check lines can therefore evaluate optimistically.
    if node.position.is_insufficient_material() {
        return 0;
    }

    if node.ply >= MAX_PLY - 1 {
        return if node.is_in_check {
            0
        } else {
            evaluate(td, ctx, node)
        };
    }

    let pos: Position = node.position;
    let mut alpha = node.alpha;
    let beta = node.beta;
    let mut best_value = -CHECKMATE + node.ply as i32;
    let mut static_eval: Option<i32> = None;
    let mut futility_base = -INF;

    let tt_entry = ctx.tt.read(&pos);
    if let Some(entry) = &tt_entry {
        static_eval = entry.static_eval();
        let tt_score = entry.score_at(node.ply, pos.halfmove_clock());
        match entry.bounds {
            Bounds::Exact => return tt_score,
            Bounds::Upper if tt_score <= alpha => return alpha,
            Bounds::Lower if tt_score >= beta => return beta,
            _ => {}
        }
    }

    // Stand pat, unless in check: the side to move may decline all
    // tactical continuations.
    if !node.is_in_check {
        let eval = match static_eval {
            Some(eval) => eval,
            None => evaluate(td, ctx, node),
        };
        static_eval = Some(eval);
        best_value = eval;

        // A bounded TT score is a tighter estimate than the raw eval.
        if let Some(entry) = &tt_entry {
            let tt_score = entry.score_at(node.ply, pos.halfmove_clock());
            if tt_score.abs() < KNOWN_WIN {
                let tighter = match entry.bounds {
                    Bounds::Lower => tt_score > best_value,
                    Bounds::Upper => tt_score < best_value,
                    Bounds::Exact => true,
                    Bounds::Invalid => false,
                };
                if tighter {
                    best_value = tt_score;
                }
            }
        }

        if best_value >= beta {
            if tt_entry.is_none() {
                write_entry(
                    ctx.tt,
                    &pos,
                    best_value,
                    node.ply,
                    static_eval,
                    0,
                    Bounds::Lower,
                    &[],
                );
            }
            return best_value;
        }
        if best_value > alpha {
            alpha = best_value;
        }

        futility_base = best_value + ctx.params.qsearch_futility_margin;
    }

    let old_alpha = alpha;

    let mut picker = MovePicker::new(
        &pos,
        &tt_hints(&tt_entry),
        Move::NULL,
        &td.orderer,
        node.ply,
        !node.is_in_check,
    );

    let mut best_moves = [Move::NULL; NUM_TT_MOVES];
    let mut num_best = 0usize;
    let mut move_index = 0u32;
    let mut quiet_evasions = 0u32;
    let mut aborted = false;

    while let Some((mv, move_score)) = picker.pick() {
        if !node.is_in_check {
            debug_assert!(!mv.is_quiet());

            if mv.is_underpromotion() {
                continue;
            }
            // Losing captures cannot rescue a quiet stand-pat.
            if move_score < GOOD_CAPTURE {
                continue;
            }
            // Futility: a capture that cannot lift the stand pat above
            // alpha is only worth trying if it wins material outright.
            if mv.is_capture()
                && futility_base > -KNOWN_WIN
                && futility_base <= alpha
                && !see_ge(&pos, mv, 1)
            {
                best_value = best_value.max(futility_base);
                continue;
            }
        }

        let child_pos = pos.do_move(mv);
        ctx.tt.prefetch(child_pos.hash());

        // Cap quiet check evasions once any line already works.
        if node.is_in_check && mv.is_quiet() {
            if num_best > 0 && quiet_evasions > 1 {
                continue;
            }
            quiet_evasions += 1;
        }

        move_index += 1;

        // Move-count cutoff: real positions rarely hold more than a few
        // good captures.
        if num_best > 0 {
            if node.depth < -4 && move_index > 1 {
                break;
            } else if node.depth < -2 && move_index > 2 {
                break;
            } else if node.depth < 0 && move_index > 3 {
                break;
            }
        }

        td.mark_eval_dirty(node.ply + 1);
        let mut child = NodeInfo {
            position: child_pos,
            ply: node.ply + 1,
            depth: node.depth - 1,
            alpha: -beta,
            beta: -alpha,
            pv_index: node.pv_index,
            previous_move: mv,
            is_in_check: child_pos.is_in_check(),
            is_pv_from_prev_iteration: false,
            is_null_move: false,
            is_cut_node: false,
            is_singular_search: false,
            move_filter: &[],
            static_eval: None,
        };
        let score = -qsearch(td, ctx, &mut child);
        debug_assert!((-CHECKMATE..=CHECKMATE).contains(&score));

        if score > best_value {
            if is_pv {
                td.pv.update(node.ply, mv);
            }
            for j in (1..NUM_TT_MOVES).rev() {
                best_moves[j] = best_moves[j - 1];
            }
            best_moves[0] = mv;
            num_best = (num_best + 1).min(NUM_TT_MOVES);
            best_value = score;

            if score >= beta {
                break;
            }
            if score > alpha {
                alpha = score;
            }
        }

        if ctx.check_stop(td, false) {
            aborted = true;
            break;
        }
    }

    // In check with nothing to play: mated here.
    if !aborted && node.is_in_check && move_index == 0 {
        return -CHECKMATE + node.ply as i32;
    }

    if !aborted {
        // A fail-low must not clobber a deeper entry for this position.
        if best_value <= old_alpha {
            if let Some(entry) = &tt_entry {
                if entry.depth > 0 {
                    return best_value;
                }
            }
        }

        let bounds = if best_value >= beta {
            Bounds::Lower
        } else if best_value > old_alpha {
            Bounds::Exact
        } else {
            Bounds::Upper
        };

        let mut hints = [sable_core::PackedMove::NULL; NUM_TT_MOVES];
        for (slot, mv) in hints.iter_mut().zip(best_moves.iter().take(num_best)) {
            *slot = mv.packed();
        }
        write_entry(
            ctx.tt,
            &pos,
            best_value,
            node.ply,
            static_eval,
            0,
            bounds,
            &hints[..num_best],
        );
    }

    best_value
}
