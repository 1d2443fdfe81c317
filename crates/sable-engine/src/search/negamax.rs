//! The main alpha-beta search node.
//!
//! Principal-variation search over the negamax formulation: non-first
//! moves are tried with a zero-width window at (possibly reduced) depth
//! and re-searched on improvement. The node carries the full menu of
//! modern heuristics — mate-distance pruning, static-eval pruning tiers,
//! null move with verification, internal iterative reduction, singular
//! and check extensions, late-move reductions — each gated the same way
//! throughout: never on PV nodes when unsound, never in check, never when
//! a move filter is active.

use chess::Piece;
use sable_core::{
    Move, PackedMove, Position, CHECKMATE, INF, KNOWN_WIN, MAX_PLY, TABLEBASE_WIN,
};

use crate::eval::from_white_perspective;
use crate::params::{history_pruning_threshold, late_move_pruning_threshold};
use crate::search::ordering::{lmr_reduction, MovePicker, GOOD_CAPTURE, MAX_MOVES};
use crate::search::qsearch::qsearch;
use crate::search::see::see_ge;
use crate::search::thread::{StackFrame, ThreadData};
use crate::search::tt::{write_entry, Bounds, TtEntry, NUM_TT_MOVES};
use crate::search::{SearchContext, SearchReport};

/// One search frame. Children reference the parent's data only through
/// the thread's per-ply stack, so frames are plain values.
pub(crate) struct NodeInfo<'a> {
    pub position: Position,
    /// Height above the root.
    pub ply: usize,
    /// Remaining draft; at or below zero the node is a quiescence node.
    pub depth: i32,
    pub alpha: i32,
    pub beta: i32,
    /// Multi-PV line being searched at the root.
    pub pv_index: usize,
    pub previous_move: Move,
    pub is_in_check: bool,
    /// On the PV of the previous iteration; enables the PV move hint.
    pub is_pv_from_prev_iteration: bool,
    /// Reached by a null move.
    pub is_null_move: bool,
    pub is_cut_node: bool,
    /// Inside a singular verification search.
    pub is_singular_search: bool,
    /// Moves excluded at this node (multi-PV roots, singular searches).
    pub move_filter: &'a [Move],
    pub static_eval: Option<i32>,
}

impl<'a> NodeInfo<'a> {
    /// Root frame for one aspiration attempt.
    pub fn root(
        position: Position,
        depth: i32,
        alpha: i32,
        beta: i32,
        pv_index: usize,
        move_filter: &'a [Move],
    ) -> Self {
        Self {
            position,
            ply: 0,
            depth,
            alpha,
            beta,
            pv_index,
            previous_move: Move::NULL,
            is_in_check: position.is_in_check(),
            is_pv_from_prev_iteration: true,
            is_null_move: false,
            is_cut_node: false,
            is_singular_search: false,
            move_filter,
            static_eval: None,
        }
    }

    #[inline]
    pub fn is_pv(&self) -> bool {
        self.beta - self.alpha != 1
    }

    #[inline]
    pub fn should_check_move(&self, mv: Move) -> bool {
        !self.move_filter.contains(&mv)
    }
}

/// Side-to-move static evaluation through the per-ply context.
pub(crate) fn evaluate(td: &mut ThreadData, ctx: &SearchContext<'_>, node: &NodeInfo<'_>) -> i32 {
    let eval_ctx = td.eval_context(node.ply);
    let white_eval = ctx.evaluator.evaluate(&node.position, eval_ctx);
    debug_assert!(white_eval.abs() < TABLEBASE_WIN);
    from_white_perspective(white_eval, node.position.side_to_move())
}

/// Move hints from a probe result, null hints when there was none.
pub(crate) fn tt_hints(entry: &Option<TtEntry>) -> [PackedMove; NUM_TT_MOVES] {
    entry
        .as_ref()
        .map_or([PackedMove::NULL; NUM_TT_MOVES], |e| e.moves)
}

/// Draw by repetition: one earlier occurrence on the search path, or a
/// third occurrence counting the game history.
fn is_repetition(td: &ThreadData, pos: &Position) -> bool {
    let hash = pos.hash();
    let window = pos.halfmove_clock() as usize;
    let path_len = td.key_history.len() - td.game_history_len;

    let mut game_occurrences = 0;
    for (i, &key) in td.key_history.iter().rev().take(window).enumerate() {
        if key == hash {
            if i < path_len {
                return true;
            }
            game_occurrences += 1;
            if game_occurrences >= 2 {
                return true;
            }
        }
    }
    false
}

/// Whether the side to move can steer back into an already-seen position
/// within the 50-move window.
fn repetition_reachable(td: &ThreadData, pos: &Position) -> bool {
    let hash = pos.hash();
    let window = pos.halfmove_clock() as usize;
    td.key_history.iter().rev().take(window).any(|&k| k == hash)
}

#[allow(clippy::too_many_arguments)]
fn child_frame<'a>(
    position: Position,
    ply: usize,
    depth: i32,
    alpha: i32,
    beta: i32,
    pv_index: usize,
    previous_move: Move,
    is_in_check: bool,
    is_pv_from_prev_iteration: bool,
    is_cut_node: bool,
) -> NodeInfo<'a> {
    NodeInfo {
        position,
        ply,
        depth,
        alpha,
        beta,
        pv_index,
        previous_move,
        is_in_check,
        is_pv_from_prev_iteration,
        is_null_move: false,
        is_cut_node,
        is_singular_search: false,
        move_filter: &[],
        static_eval: None,
    }
}

pub(crate) fn negamax(td: &mut ThreadData, ctx: &SearchContext<'_>, node: &mut NodeInfo<'_>) -> i32 {
    debug_assert!(node.alpha < node.beta);

    let is_root = node.ply == 0;
    let is_pv = node.is_pv();
    let has_filter = !node.move_filter.is_empty();
    let params = ctx.params;

    td.pv.clear_ply(node.ply);

    td.batch.nodes += 1;
    td.batch.max_depth = td.batch.max_depth.max(node.ply as u32 + 1);
    td.total_nodes += 1;
    ctx.stats.append(&mut td.batch, false);

    td.stack[node.ply] = StackFrame {
        static_eval: None,
        is_null_move: node.is_null_move,
    };

    let pos: Position = node.position;
    let mut alpha = node.alpha;
    let mut beta = node.beta;

    // In a losing position a reachable repetition is worth a draw, so the
    // window floor rises to zero.
    if !is_root && alpha < 0 && repetition_reachable(td, &pos) {
        alpha = 0;
        if alpha >= beta {
            return alpha;
        }
    }

    // Horizon: resolve tactics before trusting the evaluation.
    if node.depth <= 0 {
        return qsearch(td, ctx, node);
    }

    if node.ply >= MAX_PLY - 1 {
        return if node.is_in_check {
            0
        } else {
            evaluate(td, ctx, node)
        };
    }

    // Draw rules. The root is exempt: it must report a move either way.
    if !is_root
        && (pos.halfmove_clock() >= 100
            || pos.is_insufficient_material()
            || is_repetition(td, &pos))
    {
        return 0;
    }

    // Mate-distance pruning: no line from here can beat an already-found
    // shorter mate.
    if !is_root {
        alpha = alpha.max(-CHECKMATE + node.ply as i32);
        beta = beta.min(CHECKMATE - node.ply as i32 - 1);
        if alpha >= beta {
            return alpha;
        }
    }

    let old_alpha = node.alpha;
    let mut best_value = -INF;
    let mut static_eval: Option<i32> = None;
    let mut tb_hit = false;
    let mut depth = node.depth;

    let tt_entry = ctx.tt.read(&pos);
    let mut tt_score: Option<i32> = None;
    if let Some(entry) = &tt_entry {
        static_eval = entry.static_eval();
        let score = entry.score_at(node.ply, pos.halfmove_clock());
        tt_score = Some(score);

        // PV nodes keep searching (the table has no path information),
        // and positions deep into the 50-move count must not shortcut on
        // scores that the rule may void.
        if entry.depth as i32 >= depth && !is_pv && !has_filter && pos.halfmove_clock() < 90 {
            match entry.bounds {
                Bounds::Exact => return score,
                Bounds::Upper if score <= alpha => return alpha,
                Bounds::Lower if score >= beta => return beta,
                _ => {}
            }
        }
    }

    // Endgame tablebases: exact draws always cut; wins and losses only
    // when they agree with the window, since WDL carries no distance.
    if !is_root
        && (depth >= params.tb_probe_depth || !node.previous_move.is_quiet())
        && pos.num_pieces() <= params.tb_probe_max_pieces
    {
        if let Some(wdl) = ctx.tablebase.probe_wdl(&pos) {
            tb_hit = true;
            let tb_value = match wdl.cmp(&0) {
                std::cmp::Ordering::Less => -(TABLEBASE_WIN - node.ply as i32),
                std::cmp::Ordering::Greater => TABLEBASE_WIN - node.ply as i32,
                std::cmp::Ordering::Equal => 0,
            };
            let bounds = match wdl.cmp(&0) {
                std::cmp::Ordering::Less => Bounds::Upper,
                std::cmp::Ordering::Greater => Bounds::Lower,
                std::cmp::Ordering::Equal => Bounds::Exact,
            };

            if bounds == Bounds::Exact
                || (bounds == Bounds::Lower && tb_value >= beta)
                || (bounds == Bounds::Upper && tb_value <= alpha)
            {
                if tt_entry.is_none() {
                    write_entry(
                        ctx.tt,
                        &pos,
                        tb_value,
                        node.ply,
                        static_eval,
                        depth.clamp(0, i8::MAX as i32) as i8,
                        bounds,
                        &[],
                    );
                }
                return tb_value;
            }
        }
    }

    if !node.is_in_check {
        let mut eval = match static_eval {
            Some(eval) => eval,
            None => evaluate(td, ctx, node),
        };

        // A bounded TT score is a better estimate than the raw eval.
        if let (Some(score), Some(entry)) = (tt_score, &tt_entry) {
            if score.abs() < KNOWN_WIN {
                let tighter = match entry.bounds {
                    Bounds::Lower => score > eval,
                    Bounds::Upper => score < eval,
                    Bounds::Exact => true,
                    Bounds::Invalid => false,
                };
                if tighter {
                    eval = score;
                }
            }
        }

        static_eval = Some(eval);
        node.static_eval = Some(eval);
        td.stack[node.ply].static_eval = Some(eval);
    }

    // Improving: static eval against our position two moves ago (four if
    // we were in check then).
    let improving = match static_eval {
        Some(eval) => {
            let prev = node
                .ply
                .checked_sub(2)
                .and_then(|i| td.stack[i].static_eval)
                .or_else(|| node.ply.checked_sub(4).and_then(|i| td.stack[i].static_eval));
            match prev {
                Some(prev) => eval - prev >= -5,
                None => true,
            }
        }
        None => false,
    };

    if !is_pv && !has_filter && !node.is_in_check {
        if let Some(eval) = static_eval {
            // Futility/beta pruning: far enough above beta the node will
            // fail high anyway.
            if depth <= params.beta_pruning_depth
                && eval <= KNOWN_WIN
                && eval >= beta + params.beta_margin_bias
                    + params.beta_margin_mult * (depth - improving as i32)
            {
                return eval;
            }

            // Alpha pruning: hopelessly below the window.
            if depth <= params.alpha_pruning_depth
                && alpha < KNOWN_WIN
                && eval > -KNOWN_WIN
                && eval + params.alpha_margin_bias + params.alpha_margin_mult * depth <= alpha
            {
                return eval;
            }

            // Razoring: confirm a bad-looking node with a quiescence probe.
            if depth <= params.razoring_depth
                && beta < KNOWN_WIN
                && eval + params.razoring_bias + params.razoring_mult * depth < beta
            {
                let q_score = qsearch(td, ctx, node);
                if q_score < beta {
                    return q_score;
                }
            }

            // Null-move pruning: if passing still fails high, a real move
            // will too. Forbidden after consecutive null moves and without
            // non-pawn material (zugzwang).
            let tt_allows_null = match (&tt_entry, tt_score) {
                (Some(entry), Some(score)) => entry.bounds != Bounds::Upper || score >= beta,
                _ => true,
            };
            if eval >= beta
                && depth >= params.null_move_start_depth
                && tt_allows_null
                && pos.has_non_pawn_material(pos.side_to_move())
                && !node.is_null_move
                && !(node.ply >= 1 && td.stack[node.ply - 1].is_null_move)
            {
                if let Some(null_pos) = pos.do_null_move() {
                    let reduction =
                        params.null_move_reduction + depth / 4 + ((eval - beta) / 256).min(3);

                    td.mark_eval_dirty(node.ply + 1);
                    let mut child = NodeInfo {
                        position: null_pos,
                        ply: node.ply + 1,
                        depth: depth - reduction,
                        alpha: -beta,
                        beta: -beta + 1,
                        pv_index: node.pv_index,
                        previous_move: Move::NULL,
                        is_in_check: false,
                        is_pv_from_prev_iteration: false,
                        is_null_move: true,
                        is_cut_node: !node.is_cut_node,
                        is_singular_search: false,
                        move_filter: &[],
                        static_eval: None,
                    };
                    td.key_history.push(pos.hash());
                    let mut null_score = -negamax(td, ctx, &mut child);
                    td.key_history.pop();

                    if null_score >= beta {
                        if null_score >= TABLEBASE_WIN {
                            null_score = beta;
                        }
                        if beta.abs() < KNOWN_WIN && depth < 10 {
                            return null_score;
                        }
                        // Verification: keep searching at reduced depth.
                        depth -= params.null_move_verification_reduction;
                        if depth <= 0 {
                            return qsearch(td, ctx, node);
                        }
                    }
                }
            }
        }
    }

    // Internal iterative reduction: with no TT move the tree here is
    // poorly ordered, so spend less on it.
    if depth >= 4 && tt_entry.is_none() {
        depth -= 1 + depth / 4;
    }

    let mut global_reduction = 0;
    global_reduction += !is_pv as i32;
    global_reduction += !improving as i32;
    global_reduction += tb_hit as i32;
    if node.previous_move.is_capture() && static_eval.is_some_and(|e| e >= KNOWN_WIN) {
        global_reduction += 1;
    }

    let base_extension = (node.is_in_check && depth >= 4) as i32;

    let pv_move = td.pv_hint(
        node.is_pv_from_prev_iteration && !node.is_singular_search,
        node.pv_index,
        node.ply,
    );
    let tt_moves = tt_hints(&tt_entry);

    let mut picker = MovePicker::new(&pos, &tt_moves, pv_move, &td.orderer, node.ply, false);
    // Helper threads explore the root in a different order (lazy SMP).
    if is_root && !td.is_main {
        let mut rng = td.rng.clone();
        picker.shuffle(&mut rng);
        td.rng = rng;
    }

    let mut best_moves = [Move::NULL; NUM_TT_MOVES];
    let mut num_best = 0usize;
    let mut move_index = 0u32;
    let mut quiet_index = 0u32;
    let mut aborted = false;
    let mut filtered_some_move = false;
    let mut singular_diff = 0i32;
    let mut quiets_tried = [Move::NULL; MAX_MOVES];
    let mut num_quiets = 0usize;

    while let Some((mv, move_score)) = picker.pick() {
        if !node.should_check_move(mv) {
            filtered_some_move = true;
            continue;
        }

        let child_pos = pos.do_move(mv);
        ctx.tt.prefetch(child_pos.hash());

        move_index += 1;
        if mv.is_quiet() {
            quiet_index += 1;
        }

        let nodes_before = td.total_nodes;

        // Shallow-move pruning. Only once some move already scored above
        // losing, so at least one move is always searched.
        if !node.is_in_check && !is_root && best_value > -KNOWN_WIN {
            // Late-move pruning: quiets deep in the list at low depth.
            if mv.is_quiet()
                && depth < 9
                && quiet_index as i32
                    >= late_move_pruning_threshold(depth) + improving as i32 + is_pv as i32
            {
                continue;
            }

            // History pruning: quiets the tables hate.
            if mv.is_quiet()
                && quiet_index > 1
                && depth < 9
                && move_score < history_pruning_threshold(params, depth)
            {
                continue;
            }

            // Futility: quiets that cannot lift the eval to alpha.
            if mv.is_quiet() && quiet_index > 1 && depth > 1 && depth < 9 {
                if let Some(eval) = static_eval {
                    if eval.abs() <= KNOWN_WIN
                        && eval + params.futility_margin_quadratic * depth * depth < alpha
                    {
                        continue;
                    }
                }
            }

            // SEE pruning: moves losing material by a depth-scaled margin.
            if mv.is_capture() {
                if depth <= 4
                    && move_score < GOOD_CAPTURE
                    && !see_ge(&pos, mv, -params.see_capture_margin * depth)
                {
                    continue;
                }
            } else if depth <= 8 && !see_ge(&pos, mv, -params.see_quiet_margin * depth) {
                continue;
            }
        }

        let child_in_check = child_pos.is_in_check();

        // Long searches report the root move being worked on.
        if is_root && node.pv_index == 0 {
            if let Some(report) = ctx.report {
                if ctx.limits.elapsed().as_secs_f64() > params.current_move_report_delay {
                    report(SearchReport::CurrentMove {
                        depth,
                        mv,
                        number: move_index,
                    });
                }
            }
        }

        let mut move_extension = base_extension;
        if mv.promotion() == Some(Piece::Queen) {
            move_extension += 1;
        }
        if mv.piece() == Piece::Pawn && mv.relative_dest_rank(pos.side_to_move()) == 6 {
            move_extension += 1;
        }

        // Singular extension: verify the TT move is the only good move by
        // searching everything else below the TT score.
        if !is_root
            && !has_filter
            && depth >= params.singular_depth_min
            && !tt_moves[0].is_null()
            && mv == tt_moves[0]
        {
            if let (Some(score), Some(entry)) = (tt_score, &tt_entry) {
                if score.abs() < KNOWN_WIN
                    && entry.bounds.includes_lower()
                    && entry.depth as i32 >= depth - 2
                {
                    let singular_beta =
                        (score - params.singular_score_margin - 2 * depth).max(-CHECKMATE);
                    let filter = [mv];
                    let mut verification = NodeInfo {
                        position: pos,
                        ply: node.ply,
                        depth: depth / 2,
                        alpha: singular_beta - 1,
                        beta: singular_beta,
                        pv_index: node.pv_index,
                        previous_move: node.previous_move,
                        is_in_check: node.is_in_check,
                        is_pv_from_prev_iteration: false,
                        is_null_move: node.is_null_move,
                        is_cut_node: node.is_cut_node,
                        is_singular_search: true,
                        move_filter: &filter,
                        static_eval: node.static_eval,
                    };
                    let singular_score = negamax(td, ctx, &mut verification);

                    if singular_score < singular_beta {
                        // Everything else fails low: the TT move is singular.
                        singular_diff = singular_beta - singular_score;
                        if (node.ply as i32) < 2 * td.root_depth {
                            move_extension += 1;
                        }
                    } else if singular_score >= beta {
                        // Multi-cut: a second move already beats beta.
                        return singular_score;
                    } else if score >= beta {
                        move_extension = 0;
                    }
                }
            }
        }

        // Never let extensions more than double the nominal search depth.
        if (node.ply as i32) < 2 * td.root_depth {
            move_extension = move_extension.clamp(0, 2);
        } else {
            move_extension = 0;
        }

        // Late-move reductions. Good captures, queen promotions and
        // check positions keep their full depth.
        let mut reduction = 0;
        if depth >= params.lmr_start_depth
            && !node.is_in_check
            && move_index > 1
            && move_score < GOOD_CAPTURE
            && mv.promotion() != Some(Piece::Queen)
        {
            reduction = global_reduction + lmr_reduction(depth, move_index);

            let is_tt_move = mv == tt_moves[0];
            if !is_tt_move && singular_diff > 100 {
                reduction += 1;
            }
            if !is_tt_move && singular_diff > 400 {
                reduction += 1;
            }
            if move_score < -8000 {
                reduction += 1;
            }
            if move_score > 0 {
                reduction -= 1;
            }
            if move_score > 8000 {
                reduction -= 1;
            }
            if child_in_check {
                reduction -= 1;
            }
            if node.is_cut_node {
                reduction += 1;
            }
        }
        reduction = reduction
            .min(params.max_depth_reduction)
            .clamp(0, depth + move_extension - 1);

        let new_depth = depth + move_extension - 1;
        let from_prev_pv = node.is_pv_from_prev_iteration && mv == pv_move;

        td.key_history.push(pos.hash());
        td.mark_eval_dirty(node.ply + 1);

        let mut score = 0;
        let mut do_full_depth = !(is_pv && move_index == 1);

        // Zero-window probe at reduced depth.
        if reduction > 0 {
            let mut child = child_frame(
                child_pos,
                node.ply + 1,
                new_depth - reduction,
                -alpha - 1,
                -alpha,
                node.pv_index,
                mv,
                child_in_check,
                from_prev_pv,
                true,
            );
            score = -negamax(td, ctx, &mut child);
            do_full_depth = score > alpha;
        }

        // Zero-window at full depth.
        if do_full_depth {
            let mut child = child_frame(
                child_pos,
                node.ply + 1,
                new_depth,
                -alpha - 1,
                -alpha,
                node.pv_index,
                mv,
                child_in_check,
                from_prev_pv,
                !node.is_cut_node,
            );
            score = -negamax(td, ctx, &mut child);
        }

        // Full window for the PV line.
        if is_pv && (move_index == 1 || (score > alpha && score < beta)) {
            let mut child = child_frame(
                child_pos,
                node.ply + 1,
                new_depth,
                -beta,
                -alpha,
                node.pv_index,
                mv,
                child_in_check,
                from_prev_pv,
                false,
            );
            score = -negamax(td, ctx, &mut child);
        }

        td.key_history.pop();
        debug_assert!((-CHECKMATE..=CHECKMATE).contains(&score));

        if is_root {
            let spent = td.total_nodes - nodes_before;
            if let Some(entry) = td.node_cache.get_or_alloc(pos.hash(), 0) {
                entry.add_move_stats(mv, spent);
            }
        }

        if mv.is_quiet() {
            quiets_tried[num_quiets] = mv;
            num_quiets += 1;
        }

        if score > best_value {
            for j in (1..NUM_TT_MOVES).rev() {
                best_moves[j] = best_moves[j - 1];
            }
            best_moves[0] = mv;
            num_best = (num_best + 1).min(NUM_TT_MOVES);
            best_value = score;

            if is_pv {
                td.pv.update(node.ply, mv);
            }
        }

        if score >= beta {
            break;
        }
        if score > alpha {
            alpha = score;
        }

        if !is_root && ctx.check_stop(td, false) {
            aborted = true;
            break;
        }
    }

    // A quiet cutoff move trains the ordering tables.
    if best_value >= beta && best_moves[0].is_quiet() {
        let side = pos.side_to_move();
        td.orderer
            .update_quiet_history(side, &quiets_tried[..num_quiets], best_moves[0], depth);
        td.orderer.update_killer(node.ply, best_moves[0]);
    }

    if !aborted && move_index == 0 {
        if filtered_some_move {
            // Everything was excluded: tell the verification caller.
            return -INF;
        }
        best_value = if node.is_in_check {
            -CHECKMATE + node.ply as i32
        } else {
            0
        };
        // Proof entry at maximum depth so stale quiescence data for this
        // position can never shadow the terminal result.
        write_entry(
            ctx.tt,
            &pos,
            best_value,
            node.ply,
            Some(best_value),
            i8::MAX,
            Bounds::Exact,
            &[],
        );
        return best_value;
    }

    // Do not store when moves were filtered (the best move is not the
    // position's best) or when stopping (the score may be garbage).
    if !filtered_some_move && !ctx.check_stop(td, false) {
        let bounds = if best_value >= beta {
            Bounds::Lower
        } else if best_value > old_alpha {
            Bounds::Exact
        } else {
            Bounds::Upper
        };

        let mut hints = [PackedMove::NULL; NUM_TT_MOVES];
        for (slot, mv) in hints.iter_mut().zip(best_moves.iter().take(num_best)) {
            *slot = mv.packed();
        }
        write_entry(
            ctx.tt,
            &pos,
            best_value,
            node.ply,
            static_eval,
            depth.clamp(0, i8::MAX as i32) as i8,
            bounds,
            &hints[..num_best],
        );
    }

    best_value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::{search_harness, SearchHarness};
    use sable_core::INF;

    fn run_negamax(harness: &mut SearchHarness, pos: Position, depth: i32, ply: usize) -> i32 {
        let SearchHarness { td, ctx } = harness;
        let mut node = NodeInfo::root(pos, depth, -INF, INF, 0, &[]);
        node.ply = ply;
        negamax(td, &ctx.context(), &mut node)
    }

    #[test]
    fn finds_mate_in_one() {
        let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let mut harness = search_harness(&[]);
        let score = run_negamax(&mut harness, pos, 2, 0);
        assert_eq!(score, CHECKMATE - 1);
        assert_eq!(harness.td.pv.line(0)[0].to_uci(), "a1a8");
    }

    #[test]
    fn stalemate_scores_zero() {
        let pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let mut harness = search_harness(&[]);
        // Non-root so the terminal rules apply directly.
        let score = run_negamax(&mut harness, pos, 3, 1);
        assert_eq!(score, 0);
    }

    #[test]
    fn mated_position_scores_mate_distance() {
        // Back-rank mate already delivered; black to move at ply 1.
        let pos = Position::from_fen("R5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1").unwrap();
        let mut harness = search_harness(&[]);
        let score = run_negamax(&mut harness, pos, 3, 1);
        assert_eq!(score, -CHECKMATE + 1);
    }

    #[test]
    fn fifty_move_rule_draws_at_non_root() {
        let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 100 80").unwrap();
        let mut harness = search_harness(&[]);
        let score = run_negamax(&mut harness, pos, 4, 1);
        assert_eq!(score, 0, "halfmove clock at 100 is a draw below the root");
    }

    #[test]
    fn repeated_position_scores_zero() {
        // Knights shuffle back to the start position twice; negamax at
        // the thrice-seen position sees the draw.
        let mut pos = Position::startpos();
        let mut keys = vec![];
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
            keys.push(pos.hash());
            pos = pos.do_move(pos.parse_uci_move(uci).unwrap());
        }
        let mut harness = search_harness(&keys);
        let score = run_negamax(&mut harness, pos, 4, 1);
        assert_eq!(score, 0, "threefold repetition must score as a draw");
    }

    #[test]
    fn single_repetition_on_search_path_is_draw() {
        // One earlier occurrence inside the search path suffices.
        let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 4 10").unwrap();
        let mut harness = search_harness(&[]);
        harness.td.key_history.push(pos.hash());
        // game_history_len stays 0, so the pushed key counts as path.
        let score = run_negamax(&mut harness, pos, 4, 1);
        assert_eq!(score, 0);
    }

    #[test]
    fn insufficient_material_draws() {
        let pos = Position::from_fen("8/8/4k3/8/8/3NK3/8/8 w - - 0 1").unwrap();
        let mut harness = search_harness(&[]);
        let score = run_negamax(&mut harness, pos, 5, 1);
        assert_eq!(score, 0);
    }

    #[test]
    fn score_stays_within_mate_bounds() {
        let fens = [
            "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3",
            "8/2k5/8/8/8/8/2K1R3/8 w - - 0 1",
            "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
        ];
        for fen in fens {
            let pos = Position::from_fen(fen).unwrap();
            let mut harness = search_harness(&[]);
            let score = run_negamax(&mut harness, pos, 4, 0);
            assert!(
                (-CHECKMATE..=CHECKMATE).contains(&score),
                "score {score} out of bounds for {fen}"
            );
        }
    }

    #[test]
    fn deeper_search_still_reports_fastest_mate() {
        let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let mut harness = search_harness(&[]);
        let score = run_negamax(&mut harness, pos, 6, 0);
        assert_eq!(score, CHECKMATE - 1, "extra depth must not lengthen the mate");
    }

    #[test]
    fn filtered_only_move_returns_minus_inf() {
        // Exclude every legal move: the caller gets the sentinel.
        let pos = Position::from_fen("7k/8/8/8/8/8/P7/K7 w - - 0 1").unwrap();
        let moves = pos.legal_moves();
        let mut harness = search_harness(&[]);
        let SearchHarness { td, ctx } = &mut harness;
        let mut node = NodeInfo::root(pos, 3, -INF, INF, 0, &moves);
        node.ply = 1;
        let score = negamax(td, &ctx.context(), &mut node);
        assert_eq!(score, -INF);
    }
}
