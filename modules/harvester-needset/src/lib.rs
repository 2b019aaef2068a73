//! NeedSet Engine (§4.5): per-field need scoring and target-field selection.
//!
//! The formula is the full eight-factor multiplicative composition named in
//! §4.5:
//!
//! ```text
//! need = missing_mult × conf_mult × required_weight
//!       × tier_deficit_mult × min_refs_deficit_mult × conflict_mult
//!       × freshness_decay × identity_cap
//! ```
//!
//! `missing_mult` is a hard `{0, 1}` gate — once a field satisfies the
//! confidence gate it drops out of the NeedSet entirely (`need_score == 0`)
//! regardless of every other factor — while the remaining factors are
//! graduated bonuses/penalties on top of that gate.

use harvester_common::{NeedSetRow, RequiredLevel};

/// Bonus applied when the best available evidence falls short of the tier
/// the field's required level calls for.
const TIER_DEFICIT_BONUS: f64 = 1.3;
/// Ceiling on the `min_refs_deficit_mult` bonus (distinct-source refs short
/// of the level's requirement).
const MAX_MIN_REFS_DEFICIT_BONUS: f64 = 1.3;
/// Bonus applied when current candidates disagree.
const CONFLICT_BONUS: f64 = 1.25;
/// Ceiling on the staleness (`freshness_decay`) bonus.
const MAX_STALENESS_BONUS: f64 = 1.4;
/// Days of staleness at which the bonus saturates.
const STALENESS_SATURATION_DAYS: f64 = 60.0;
/// `identity_cap` factor applied to every non-identity field while identity
/// has not yet locked — clamps the NeedSet down to identity fields first,
/// per §4.5's "identity_cap clamps target fields before identity is locked".
const IDENTITY_CAP_FACTOR: f64 = 0.05;

/// Minimum distinct-source refs §4.5's `min_refs_deficit_mult` expects per
/// required level. Not given concrete numbers by the spec; chosen so
/// identity/critical fields — the ones a wrong value is costliest for —
/// need corroboration from a second source before the deficit bonus clears,
/// while lower levels are satisfied by a single source (recorded in
/// DESIGN.md).
pub fn min_refs_required(required_level: RequiredLevel) -> usize {
    match required_level {
        RequiredLevel::Identity | RequiredLevel::Critical => 2,
        RequiredLevel::Required | RequiredLevel::Expected | RequiredLevel::Optional => 1,
    }
}

/// Compute the priority score driving target-field selection for a round.
///
/// `gate_satisfied` is the `missing_mult` hard gate: true once the field's
/// currently selected candidate already clears the run's confidence gate,
/// in which case the whole score is forced to `0.0` — the field drops out
/// of the NeedSet no matter how stale, conflicted, or under-sourced it is.
///
/// `confidence` is the current selected candidate's confidence (`0.0` if
/// none selected yet); `conf_mult = 1 − confidence`.
///
/// `distinct_refs` is the number of distinct-source evidence refs backing
/// the current candidate; `min_refs_deficit_mult` grows when it falls short
/// of [`min_refs_required`] for `required_level`.
///
/// `identity_locked` gates `identity_cap`: while the product's identity
/// fields are not yet locked, every non-identity field's score is clamped
/// down by [`IDENTITY_CAP_FACTOR`] so the round prioritizes identity first.
///
/// `stale_days` is `None` when the field was never validated (staleness
/// doesn't apply — the gate/missing factors already dominate).
#[allow(clippy::too_many_arguments)]
pub fn compute_need_score(
    required_level: RequiredLevel,
    gate_satisfied: bool,
    confidence: f64,
    tier_deficit: bool,
    distinct_refs: usize,
    conflict: bool,
    stale_days: Option<i64>,
    identity_locked: bool,
) -> f64 {
    if gate_satisfied {
        return 0.0;
    }

    let required_weight = required_level.weight();
    let conf_mult = (1.0 - confidence).clamp(0.0, 1.0);

    let tier_deficit_mult = if tier_deficit { TIER_DEFICIT_BONUS } else { 1.0 };

    let min_refs_deficit_mult = {
        let required_refs = min_refs_required(required_level);
        if distinct_refs < required_refs {
            let ratio = (required_refs - distinct_refs) as f64 / required_refs as f64;
            1.0 + ratio * (MAX_MIN_REFS_DEFICIT_BONUS - 1.0)
        } else {
            1.0
        }
    };

    let conflict_mult = if conflict { CONFLICT_BONUS } else { 1.0 };

    let freshness_decay = match stale_days {
        Some(days) => {
            let ratio = (days as f64 / STALENESS_SATURATION_DAYS).min(1.0);
            1.0 + ratio * (MAX_STALENESS_BONUS - 1.0)
        }
        None => 1.0,
    };

    let identity_cap = if !identity_locked && required_level != RequiredLevel::Identity {
        IDENTITY_CAP_FACTOR
    } else {
        1.0
    };

    1.0 * conf_mult
        * required_weight
        * tier_deficit_mult
        * min_refs_deficit_mult
        * conflict_mult
        * freshness_decay
        * identity_cap
}

/// Build reason codes explaining why a field needs attention, in priority order.
pub fn reason_codes(missing: bool, tier_deficit: bool, conflict: bool, stale_days: Option<i64>) -> Vec<String> {
    let mut reasons = Vec::new();
    if missing {
        reasons.push("missing".to_string());
    }
    if tier_deficit {
        reasons.push("tier_deficit".to_string());
    }
    if conflict {
        reasons.push("conflict".to_string());
    }
    if let Some(days) = stale_days {
        if days as f64 >= STALENESS_SATURATION_DAYS / 2.0 {
            reasons.push("stale".to_string());
        }
    }
    reasons
}

#[allow(clippy::too_many_arguments)]
pub fn build_row(
    field_key: impl Into<String>,
    required_level: RequiredLevel,
    missing: bool,
    gate_satisfied: bool,
    confidence: f64,
    tier_deficit: bool,
    distinct_refs: usize,
    conflict: bool,
    stale_days: Option<i64>,
    identity_locked: bool,
) -> NeedSetRow {
    let need_score = compute_need_score(
        required_level,
        gate_satisfied,
        confidence,
        tier_deficit,
        distinct_refs,
        conflict,
        stale_days,
        identity_locked,
    );
    let reasons = reason_codes(missing, tier_deficit, conflict, stale_days);

    NeedSetRow {
        field_key: field_key.into(),
        required_level: Some(required_level),
        need_score,
        reason_codes: reasons,
        missing,
        tier_deficit,
        conflict,
    }
}

/// Select the top `max_fields` rows by need score, highest first. Ties break
/// on required level (more critical first) then field key for determinism.
pub fn select_target_fields(rows: &[NeedSetRow], max_fields: usize) -> Vec<&NeedSetRow> {
    let level_weight = |row: &NeedSetRow| row.required_level.map(RequiredLevel::weight).unwrap_or(0.0);

    let mut sorted: Vec<&NeedSetRow> = rows.iter().filter(|r| r.need_score > 0.0).collect();
    sorted.sort_by(|a, b| {
        b.need_score
            .partial_cmp(&a.need_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| level_weight(b).partial_cmp(&level_weight(a)).unwrap())
            .then_with(|| a.field_key.cmp(&b.field_key))
    });
    sorted.truncate(max_fields);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_satisfied_forces_zero_regardless_of_other_factors() {
        let score = compute_need_score(RequiredLevel::Critical, true, 0.1, true, 0, true, Some(365), false);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn missing_identity_field_outranks_optional_conflict() {
        let identity_missing = compute_need_score(RequiredLevel::Identity, false, 0.0, false, 0, false, None, false);
        let optional_conflict = compute_need_score(RequiredLevel::Optional, false, 0.9, false, 1, true, None, true);
        assert!(identity_missing > optional_conflict);
    }

    #[test]
    fn lower_confidence_outweighs_higher_confidence_at_same_level() {
        let low_conf = compute_need_score(RequiredLevel::Required, false, 0.2, false, 1, false, None, true);
        let high_conf = compute_need_score(RequiredLevel::Required, false, 0.8, false, 1, false, None, true);
        assert!(low_conf > high_conf);
    }

    #[test]
    fn staleness_increases_need_up_to_saturation() {
        let fresh = compute_need_score(RequiredLevel::Expected, false, 0.5, false, 1, false, Some(1), true);
        let stale = compute_need_score(RequiredLevel::Expected, false, 0.5, false, 1, false, Some(60), true);
        let beyond = compute_need_score(RequiredLevel::Expected, false, 0.5, false, 1, false, Some(120), true);
        assert!(stale > fresh);
        assert!((stale - beyond).abs() < 1e-9, "staleness bonus should saturate at 60 days");
    }

    #[test]
    fn conflict_and_tier_deficit_compound() {
        let neither = compute_need_score(RequiredLevel::Critical, false, 0.5, false, 2, false, None, true);
        let both = compute_need_score(RequiredLevel::Critical, false, 0.5, true, 2, true, None, true);
        assert!(both > neither);
    }

    #[test]
    fn min_refs_deficit_raises_need_below_the_level_threshold() {
        let under_sourced = compute_need_score(RequiredLevel::Identity, false, 0.5, false, 0, false, None, true);
        let fully_sourced = compute_need_score(RequiredLevel::Identity, false, 0.5, false, 2, false, None, true);
        assert!(under_sourced > fully_sourced);
    }

    #[test]
    fn identity_cap_suppresses_non_identity_fields_before_lock() {
        let locked = compute_need_score(RequiredLevel::Required, false, 0.0, false, 1, false, None, true);
        let unlocked = compute_need_score(RequiredLevel::Required, false, 0.0, false, 1, false, None, false);
        assert!(unlocked < locked);
    }

    #[test]
    fn identity_cap_does_not_suppress_identity_fields_themselves() {
        let score = compute_need_score(RequiredLevel::Identity, false, 0.0, false, 0, false, None, false);
        let uncapped = compute_need_score(RequiredLevel::Identity, false, 0.0, false, 0, false, None, true);
        assert_eq!(score, uncapped, "identity_cap only applies to non-identity fields");
    }

    #[test]
    fn select_target_fields_orders_by_need_score_desc() {
        let rows = vec![
            build_row("brand", RequiredLevel::Identity, false, true, 1.0, false, 2, false, None, true),
            build_row("warranty_years", RequiredLevel::Optional, true, false, 0.0, false, 0, false, None, true),
            build_row("weight_kg", RequiredLevel::Required, true, false, 0.0, false, 0, false, None, true),
        ];
        let top = select_target_fields(&rows, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].field_key, "weight_kg");
    }

    #[test]
    fn zero_need_score_rows_are_excluded() {
        // A row can legitimately have need_score == 0 only if callers construct
        // it directly with no factors; select_target_fields should drop it.
        let rows = vec![NeedSetRow {
            field_key: "noop".into(),
            required_level: Some(RequiredLevel::Optional),
            need_score: 0.0,
            reason_codes: vec![],
            missing: false,
            tier_deficit: false,
            conflict: false,
        }];
        assert!(select_target_fields(&rows, 5).is_empty());
    }
}
