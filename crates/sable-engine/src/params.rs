//! Search and time-management tunables.
//!
//! One flat record of every numeric constant the search reads, with the
//! shipped defaults. Values are set before a search starts (UCI
//! `setoption`, tuning harness) and never written while one is running.
//! The range noted on each field is the sane tuning interval, not a
//! hard limit.

/// Tunable search parameters.
#[derive(Debug, Clone)]
pub struct Params {
    /// Depth at which aspiration windows engage. Range 4..=10.
    pub aspiration_depth_start: i32,
    /// Initial window half-width at the engage depth. Range 20..=80.
    pub aspiration_window_start: i32,
    /// Smallest half-width the per-depth shrink can reach. Range 10..=40.
    pub aspiration_window_end: i32,
    /// Half-width shrink per depth above the engage depth. Range 1..=8.
    pub aspiration_window_step: i32,
    /// Widths beyond this fall back to a full window. Range 200..=1000.
    pub aspiration_window_max: i32,

    /// Maximum depth for beta (reverse futility) pruning. Range 5..=9.
    pub beta_pruning_depth: i32,
    /// Flat margin for beta pruning. Range 0..=30.
    pub beta_margin_bias: i32,
    /// Per-depth margin for beta pruning. Range 90..=180.
    pub beta_margin_mult: i32,

    /// Maximum depth for alpha pruning. Range 3..=7.
    pub alpha_pruning_depth: i32,
    /// Flat margin for alpha pruning. Range 1000..=3000.
    pub alpha_margin_bias: i32,
    /// Per-depth margin for alpha pruning. Range 150..=400.
    pub alpha_margin_mult: i32,

    /// Maximum depth for razoring. Range 2..=4.
    pub razoring_depth: i32,
    /// Flat razoring margin. Range 0..=100.
    pub razoring_bias: i32,
    /// Per-depth razoring margin. Range 60..=250.
    pub razoring_mult: i32,

    /// Minimum depth for null-move pruning. Range 2..=4.
    pub null_move_start_depth: i32,
    /// Base null-move depth reduction. Range 3..=5.
    pub null_move_reduction: i32,
    /// Depth taken off the verification search after a null-move cutoff.
    /// Range 3..=5.
    pub null_move_verification_reduction: i32,

    /// Minimum depth for late-move reductions. Range 2..=4.
    pub lmr_start_depth: i32,
    /// Hard cap on any single depth reduction. Range 6..=12.
    pub max_depth_reduction: i32,

    /// Linear term of the history-pruning threshold. Range 128..=512.
    pub history_pruning_linear: i32,
    /// Quadratic term of the history-pruning threshold. Range 32..=128.
    pub history_pruning_quadratic: i32,
    /// Quadratic futility margin for quiet moves. Range 16..=64.
    pub futility_margin_quadratic: i32,
    /// SEE margin per depth for captures. Range 80..=160.
    pub see_capture_margin: i32,
    /// SEE margin per depth for quiet moves. Range 40..=100.
    pub see_quiet_margin: i32,

    /// Minimum depth for singular-extension verification. Range 6..=10.
    pub singular_depth_min: i32,
    /// Flat margin subtracted from the TT score for the singular window.
    /// Range 0..=20.
    pub singular_score_margin: i32,

    /// Root-singularity score threshold at the minimum depth. Range 300..=500.
    pub root_singularity_threshold_max: i32,
    /// Root-singularity threshold floor. Range 100..=300.
    pub root_singularity_threshold_min: i32,
    /// Threshold decrease per depth past the minimum. Range 10..=50.
    pub root_singularity_step: i32,

    /// Stand-pat margin for quiescence capture futility. Range 100..=250.
    pub qsearch_futility_margin: i32,

    /// Consecutive mate scores before an unbounded search stops. Range 3..=10.
    pub mate_count_stop: u32,
    /// Maximum PV length reported outside analysis mode. Range 10..=40.
    pub max_pv_line_length: usize,
    /// Seconds before `currmove` reports begin. Range 5.0..=30.0.
    pub current_move_report_delay: f64,

    /// Tablebase probes require at least this depth (or a noisy previous
    /// move). Range 2..=6.
    pub tb_probe_depth: i32,
    /// Maximum piece count for WDL probes. Range 3..=7.
    pub tb_probe_max_pieces: u32,

    /// Midpoint of the moves-left estimator. Range 30.0..=60.0.
    pub tm_moves_left_midpoint: f64,
    /// Steepness of the moves-left estimator. Range 1.5..=2.6.
    pub tm_moves_left_steepness: f64,
    /// Fraction of the per-move budget allotted as ideal time. Range 0.7..=1.0.
    pub tm_ideal_factor: f64,
    /// Node-fraction scale without increment. Range 1.6..=2.6.
    pub tm_nodes_scale_no_inc: f64,
    /// Node-fraction scale with a healthy increment. Range 1.4..=2.2.
    pub tm_nodes_scale_inc: f64,
    /// Node-fraction offset. Range 0.1..=0.9.
    pub tm_nodes_offset: f64,
    /// Increment/time ratio at which the increment scale fully applies.
    /// Range 0.05..=0.2.
    pub tm_inc_ratio_full: f64,
    /// Stability factor offset. Range 1.0..=2.0.
    pub tm_stability_offset: f64,
    /// Stability factor decrease per stable depth. Range 0.0..=0.2.
    pub tm_stability_scale: f64,
    /// Stability counter cap. Range 8..=16.
    pub tm_stability_max: u32,
    /// Fraction of ideal time after which root-singularity checks start.
    /// Range 0.1..=0.4.
    pub tm_singularity_fraction: f64,
    /// First depth at which the time manager rescales the soft budget.
    /// Range 4..=8.
    pub tm_update_min_depth: i32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            aspiration_depth_start: 6,
            aspiration_window_start: 40,
            aspiration_window_end: 20,
            aspiration_window_step: 4,
            aspiration_window_max: 500,

            beta_pruning_depth: 7,
            beta_margin_bias: 5,
            beta_margin_mult: 135,

            alpha_pruning_depth: 5,
            alpha_margin_bias: 2000,
            alpha_margin_mult: 256,

            razoring_depth: 3,
            razoring_bias: 20,
            razoring_mult: 128,

            null_move_start_depth: 2,
            null_move_reduction: 4,
            null_move_verification_reduction: 4,

            lmr_start_depth: 3,
            max_depth_reduction: 8,

            history_pruning_linear: 256,
            history_pruning_quadratic: 64,
            futility_margin_quadratic: 32,
            see_capture_margin: 120,
            see_quiet_margin: 64,

            singular_depth_min: 8,
            singular_score_margin: 5,

            root_singularity_threshold_max: 400,
            root_singularity_threshold_min: 200,
            root_singularity_step: 25,

            qsearch_futility_margin: 150,

            mate_count_stop: 5,
            max_pv_line_length: 20,
            current_move_report_delay: 10.0,

            tb_probe_depth: 4,
            tb_probe_max_pieces: 5,

            tm_moves_left_midpoint: 47.0,
            tm_moves_left_steepness: 2.05,
            tm_ideal_factor: 0.824,
            tm_nodes_scale_no_inc: 2.08,
            tm_nodes_scale_inc: 1.78,
            tm_nodes_offset: 0.46,
            tm_inc_ratio_full: 0.1,
            tm_stability_offset: 1.10,
            tm_stability_scale: 0.03,
            tm_stability_max: 12,
            tm_singularity_fraction: 0.2,
            tm_update_min_depth: 5,
        }
    }
}

/// Late-move-pruning threshold: quiet moves past this index are skipped
/// at shallow depths.
#[inline]
pub fn late_move_pruning_threshold(depth: i32) -> i32 {
    3 + depth + depth * depth / 2
}

/// History-pruning threshold: quiet moves scoring below this are skipped
/// at shallow depths.
#[inline]
pub fn history_pruning_threshold(params: &Params, depth: i32) -> i32 {
    -params.history_pruning_linear * depth - params.history_pruning_quadratic * depth * depth
}
