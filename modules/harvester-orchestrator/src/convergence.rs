//! Convergence evaluator (§4.12 stop conditions). A pure function over one
//! round's signal plus the running counters, so every stop condition is
//! independently unit-testable without standing up the whole engine.

use harvester_common::Config;

use crate::types::{ConvergenceState, RoundSignal, StopReason};

/// Evaluate all seven stop conditions in the order §4.12 lists them and
/// return the first that applies, updating `state`'s consecutive-round
/// counters along the way. Returns `None` when the round loop should
/// continue.
pub fn evaluate(signal: &RoundSignal, state: &mut ConvergenceState, cfg: &Config) -> Option<StopReason> {
    if signal.cancelled {
        return Some(StopReason::Cancelled);
    }

    if signal.all_required_fields_validated {
        return Some(StopReason::AllRequiredFieldsValidated);
    }

    if signal.round_number >= cfg.max_rounds {
        return Some(StopReason::MaxRoundsReached);
    }

    if signal.identity_conflict_all_tier1 {
        return Some(StopReason::IdentityFastFail);
    }

    if signal.elapsed_secs >= cfg.wall_clock_budget_secs {
        return Some(StopReason::WallClockBudgetExhausted);
    }

    state.consecutive_no_progress = if signal.field_state_changed { 0 } else { state.consecutive_no_progress + 1 };
    if state.consecutive_no_progress >= cfg.no_progress_limit {
        return Some(StopReason::NoProgressLimitReached);
    }

    state.consecutive_low_quality = if signal.round_quality_ok { 0 } else { state.consecutive_low_quality + 1 };
    if state.consecutive_low_quality >= cfg.max_low_quality_rounds {
        return Some(StopReason::MaxLowQualityRoundsReached);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_signal(round: u32) -> RoundSignal {
        RoundSignal {
            round_number: round,
            all_required_fields_validated: false,
            field_state_changed: true,
            round_quality_ok: true,
            identity_conflict_all_tier1: false,
            elapsed_secs: 0,
            cancelled: false,
        }
    }

    fn cfg() -> Config {
        let mut c = Config::from_env();
        c.max_rounds = 5;
        c.no_progress_limit = 2;
        c.max_low_quality_rounds = 2;
        c.wall_clock_budget_secs = 1000;
        c
    }

    #[test]
    fn healthy_round_does_not_stop() {
        let mut state = ConvergenceState::default();
        assert!(evaluate(&base_signal(1), &mut state, &cfg()).is_none());
    }

    #[test]
    fn cancellation_wins_over_every_other_condition() {
        let mut state = ConvergenceState::default();
        let mut signal = base_signal(1);
        signal.cancelled = true;
        signal.all_required_fields_validated = true;
        assert_eq!(evaluate(&signal, &mut state, &cfg()), Some(StopReason::Cancelled));
    }

    #[test]
    fn all_required_fields_validated_stops_the_run() {
        let mut state = ConvergenceState::default();
        let mut signal = base_signal(1);
        signal.all_required_fields_validated = true;
        assert_eq!(evaluate(&signal, &mut state, &cfg()), Some(StopReason::AllRequiredFieldsValidated));
    }

    #[test]
    fn max_rounds_stops_even_with_healthy_progress() {
        let mut state = ConvergenceState::default();
        assert_eq!(evaluate(&base_signal(5), &mut state, &cfg()), Some(StopReason::MaxRoundsReached));
    }

    #[test]
    fn identity_conflict_across_all_tier1_sources_fast_fails() {
        let mut state = ConvergenceState::default();
        let mut signal = base_signal(1);
        signal.identity_conflict_all_tier1 = true;
        assert_eq!(evaluate(&signal, &mut state, &cfg()), Some(StopReason::IdentityFastFail));
    }

    #[test]
    fn wall_clock_budget_exhaustion_stops_the_run() {
        let mut state = ConvergenceState::default();
        let mut signal = base_signal(1);
        signal.elapsed_secs = 1000;
        assert_eq!(evaluate(&signal, &mut state, &cfg()), Some(StopReason::WallClockBudgetExhausted));
    }

    #[test]
    fn no_progress_limit_requires_consecutive_rounds() {
        let mut state = ConvergenceState::default();
        let mut signal = base_signal(1);
        signal.field_state_changed = false;

        assert!(evaluate(&signal, &mut state, &cfg()).is_none());
        signal.round_number = 2;
        assert_eq!(evaluate(&signal, &mut state, &cfg()), Some(StopReason::NoProgressLimitReached));
    }

    #[test]
    fn progress_in_between_resets_the_no_progress_counter() {
        let mut state = ConvergenceState::default();
        let mut stalled = base_signal(1);
        stalled.field_state_changed = false;
        evaluate(&stalled, &mut state, &cfg());
        assert_eq!(state.consecutive_no_progress, 1);

        let mut progressed = base_signal(2);
        progressed.field_state_changed = true;
        evaluate(&progressed, &mut state, &cfg());
        assert_eq!(state.consecutive_no_progress, 0);
    }

    #[test]
    fn max_low_quality_rounds_requires_consecutive_rounds() {
        let mut state = ConvergenceState::default();
        let mut signal = base_signal(1);
        signal.round_quality_ok = false;

        assert!(evaluate(&signal, &mut state, &cfg()).is_none());
        signal.round_number = 2;
        assert_eq!(evaluate(&signal, &mut state, &cfg()), Some(StopReason::MaxLowQualityRoundsReached));
    }
}
