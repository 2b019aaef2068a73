//! Pure, total transition functions (§9 redesign flag): every operation
//! takes the current `ReviewState` and returns `(new_state, AuditEvent)`.
//! No transition can panic or leave the state machine in an unrepresented
//! combination — that's the point of the closed sum type in `types.rs`.
//!
//! ```text
//!            ai_pending ──confirm──▶ ai_confirmed
//!                 │                         │
//!                 └──accept──▶ accepted ◀──accept──
//!                                     │
//!                                override──▶ overridden (no candidate)
//! ```
//!
//! `accept` and `override` are reachable from any state (re-accepting or
//! re-overriding an already-decided key is allowed and simply records a new
//! audit event); `confirm` only ever flips `ai_pending` to `ai_confirmed`
//! and is a no-op on every other state (rule: "confirm never mutates
//! selected_value").

use chrono::{DateTime, Utc};

use crate::types::{AuditEvent, Lane, ReviewAction, ReviewState, TargetKey};

fn audit(key: &TargetKey, action: ReviewAction, prev: &ReviewState, new: ReviewState, at: DateTime<Utc>) -> AuditEvent {
    AuditEvent {
        key_id: key.stable_id(),
        lane: key.lane(),
        action,
        prev_state: Some(prev.clone()),
        new_state: new.clone(),
        at,
    }
}

/// `accept(candidate_id)`: sets `selected_candidate_id` and mirrors
/// `selected_value` (invariant: `accept` selects a value/candidate).
pub fn accept(
    key: &TargetKey,
    current: &ReviewState,
    candidate_id: impl Into<String>,
    value: impl Into<String>,
    at: DateTime<Utc>,
) -> (ReviewState, AuditEvent) {
    let new_state = ReviewState::Accepted {
        candidate_id: candidate_id.into(),
        value: value.into(),
    };
    let event = audit(key, ReviewAction::Accept, current, new_state.clone(), at);
    (new_state, event)
}

/// `confirm()`: clears AI-pending without ever mutating `selected_value`
/// (rule in §4.10). A no-op transition on any state other than
/// `AiPending` — the returned state equals `current`.
pub fn confirm(key: &TargetKey, current: &ReviewState, at: DateTime<Utc>) -> (ReviewState, AuditEvent) {
    let new_state = match current {
        ReviewState::AiPending => ReviewState::AiConfirmed,
        other => other.clone(),
    };
    let event = audit(key, ReviewAction::Confirm, current, new_state.clone(), at);
    (new_state, event)
}

/// `override(value)`: sets no candidate (invariant 7: a manual override
/// sets none).
pub fn override_value(
    key: &TargetKey,
    current: &ReviewState,
    value: impl Into<String>,
    at: DateTime<Utc>,
) -> (ReviewState, AuditEvent) {
    let new_state = ReviewState::Overridden { value: value.into() };
    let event = audit(key, ReviewAction::Override, current, new_state.clone(), at);
    (new_state, event)
}

/// `primary_accept` — item lane. `primary` only applies to `Lane::Primary`
/// (invariant 6); the caller is expected to pass a `TargetKey::Grid`.
pub fn primary_accept(
    key: &TargetKey,
    current: &ReviewState,
    candidate_id: impl Into<String>,
    value: impl Into<String>,
    at: DateTime<Utc>,
) -> (ReviewState, AuditEvent) {
    debug_assert_eq!(key.lane(), Lane::Primary);
    accept(key, current, candidate_id, value, at)
}

pub fn primary_confirm(key: &TargetKey, current: &ReviewState, at: DateTime<Utc>) -> (ReviewState, AuditEvent) {
    debug_assert_eq!(key.lane(), Lane::Primary);
    confirm(key, current, at)
}

pub fn primary_override(
    key: &TargetKey,
    current: &ReviewState,
    value: impl Into<String>,
    at: DateTime<Utc>,
) -> (ReviewState, AuditEvent) {
    debug_assert_eq!(key.lane(), Lane::Primary);
    override_value(key, current, value, at)
}

/// `shared_accept` — canonical lane (`component_key` / `enum_key`).
/// Relinking items whose item lane matches is handled one layer up by
/// `linking::relink_on_shared_accept`, since that's a cross-key effect this
/// pure function cannot express.
pub fn shared_accept(
    key: &TargetKey,
    current: &ReviewState,
    candidate_id: impl Into<String>,
    value: impl Into<String>,
    at: DateTime<Utc>,
) -> (ReviewState, AuditEvent) {
    debug_assert_eq!(key.lane(), Lane::Shared);
    accept(key, current, candidate_id, value, at)
}

pub fn shared_confirm(key: &TargetKey, current: &ReviewState, at: DateTime<Utc>) -> (ReviewState, AuditEvent) {
    debug_assert_eq!(key.lane(), Lane::Shared);
    confirm(key, current, at)
}

pub fn shared_override(
    key: &TargetKey,
    current: &ReviewState,
    value: impl Into<String>,
    at: DateTime<Utc>,
) -> (ReviewState, AuditEvent) {
    debug_assert_eq!(key.lane(), Lane::Shared);
    override_value(key, current, value, at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_key() -> TargetKey {
        TargetKey::Grid { product_id: "p1".into(), field_key: "weight_kg".into() }
    }

    fn t() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn confirm_from_ai_pending_moves_to_ai_confirmed() {
        let (new_state, event) = primary_confirm(&grid_key(), &ReviewState::AiPending, t());
        assert_eq!(new_state, ReviewState::AiConfirmed);
        assert_eq!(event.action, ReviewAction::Confirm);
    }

    #[test]
    fn confirm_never_mutates_an_already_accepted_value() {
        let accepted = ReviewState::Accepted { candidate_id: "c1".into(), value: "60".into() };
        let (new_state, _) = primary_confirm(&grid_key(), &accepted, t());
        assert_eq!(new_state, accepted);
    }

    #[test]
    fn accept_mirrors_selected_value_and_sets_candidate() {
        let (new_state, _) = primary_accept(&grid_key(), &ReviewState::AiPending, "c1", "60 g", t());
        assert_eq!(new_state.selected_value(), Some("60 g"));
        assert_eq!(new_state.selected_candidate_id(), Some("c1"));
    }

    #[test]
    fn override_sets_no_candidate() {
        let (new_state, _) = primary_override(&grid_key(), &ReviewState::AiPending, "manual value", t());
        assert_eq!(new_state.selected_value(), Some("manual value"));
        assert_eq!(new_state.selected_candidate_id(), None);
        assert!(new_state.is_overridden());
    }

    #[test]
    fn override_after_accept_drops_the_candidate_id() {
        let accepted = ReviewState::Accepted { candidate_id: "c1".into(), value: "60 g".into() };
        let (new_state, _) = primary_override(&grid_key(), &accepted, "65 g", t());
        assert_eq!(new_state.selected_candidate_id(), None);
    }
}
