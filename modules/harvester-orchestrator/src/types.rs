//! Run Orchestrator (§4.12) round-loop types.

use serde::{Deserialize, Serialize};

/// Any of the seven stop conditions in §4.12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    AllRequiredFieldsValidated,
    MaxRoundsReached,
    NoProgressLimitReached,
    MaxLowQualityRoundsReached,
    IdentityFastFail,
    WallClockBudgetExhausted,
    Cancelled,
}

impl StopReason {
    /// §8 boundary behavior: zero discovered sources terminates `no_sources`,
    /// not `failed` — that status is assigned by the caller from the run's
    /// source count, not from a `StopReason` variant, so it isn't listed
    /// here; see `Orchestrator::run`.
    pub fn reason_code(self) -> &'static str {
        match self {
            StopReason::AllRequiredFieldsValidated => "all_required_fields_validated",
            StopReason::MaxRoundsReached => "max_rounds_reached",
            StopReason::NoProgressLimitReached => "no_progress_limit_reached",
            StopReason::MaxLowQualityRoundsReached => "max_low_quality_rounds_reached",
            StopReason::IdentityFastFail => "identity_conflict",
            StopReason::WallClockBudgetExhausted => "wall_clock_budget_exhausted",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// Facts about one completed round, fed into the convergence evaluator.
/// Built by the orchestrator from the round's NeedSet/Consensus/Review
/// outputs — kept as a flat struct so `convergence::evaluate` stays a pure
/// function independent of the live engine state.
#[derive(Debug, Clone)]
pub struct RoundSignal {
    pub round_number: u32,
    pub all_required_fields_validated: bool,
    pub field_state_changed: bool,
    pub round_quality_ok: bool,
    pub identity_conflict_all_tier1: bool,
    pub elapsed_secs: u64,
    pub cancelled: bool,
}

/// Running tallies the convergence evaluator needs across rounds — the
/// consecutive-round counters §4.12's `no_progress_limit` and
/// `max_low_quality_rounds` conditions require.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceState {
    pub consecutive_no_progress: u32,
    pub consecutive_low_quality: u32,
}
