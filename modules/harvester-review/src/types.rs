//! Review State Machine (§4.10) types: two independent lanes, a closed sum
//! type per lifecycle state, and an append-only audit event per transition.
//! Per §9's redesign flag, this replaces an "object with optional fields"
//! model with one variant per state so an invalid combination (e.g. an
//! accepted row with no candidate and a non-empty value_raw from nowhere)
//! is unrepresentable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which lane a target key belongs to (§3 Key Review State, §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Item-specific (grid) lane. `primary` applies only here (invariant 6).
    Primary,
    /// Canonical (component/enum) lane, shared across items.
    Shared,
}

/// The three key shapes named in §3. `Grid` is always `Lane::Primary`;
/// `Component` and `Enum` are always `Lane::Shared`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetKey {
    Grid { product_id: String, field_key: String },
    Component { component_identifier: String, property: String },
    Enum { field_key: String, enum_value_norm: String },
}

impl TargetKey {
    pub fn lane(&self) -> Lane {
        match self {
            TargetKey::Grid { .. } => Lane::Primary,
            TargetKey::Component { .. } | TargetKey::Enum { .. } => Lane::Shared,
        }
    }

    /// Stable string id used as the audit log's foreign key and the store's
    /// primary key — arena-style indirection so the audit log never embeds
    /// a cyclic reference back into live state (§9 redesign flag).
    pub fn stable_id(&self) -> String {
        match self {
            TargetKey::Grid { product_id, field_key } => format!("grid:{product_id}:{field_key}"),
            TargetKey::Component { component_identifier, property } => {
                format!("component:{component_identifier}:{property}")
            }
            TargetKey::Enum { field_key, enum_value_norm } => format!("enum:{field_key}:{enum_value_norm}"),
        }
    }
}

/// One lifecycle state per lane target. A candidate accept and a manual
/// override are mutually exclusive (invariant 7): `Accepted` always carries
/// a `candidate_id`, `Overridden` never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReviewState {
    AiPending,
    AiConfirmed,
    Accepted { candidate_id: String, value: String },
    Overridden { value: String },
}

impl ReviewState {
    pub fn selected_value(&self) -> Option<&str> {
        match self {
            ReviewState::Accepted { value, .. } | ReviewState::Overridden { value } => Some(value),
            ReviewState::AiPending | ReviewState::AiConfirmed => None,
        }
    }

    pub fn selected_candidate_id(&self) -> Option<&str> {
        match self {
            ReviewState::Accepted { candidate_id, .. } => Some(candidate_id),
            _ => None,
        }
    }

    pub fn is_overridden(&self) -> bool {
        matches!(self, ReviewState::Overridden { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Accept,
    Confirm,
    Override,
}

/// Append-only audit record. References the target by id only, never by a
/// live pointer into `ReviewState` (§9 redesign flag: arena + stable ids).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub key_id: String,
    pub lane: Lane,
    pub action: ReviewAction,
    pub prev_state: Option<ReviewState>,
    pub new_state: ReviewState,
    pub at: DateTime<Utc>,
}

/// Link-table side effect, logged separately from `AuditEvent` because it
/// describes item↔canonical linkage, not a lane's own lifecycle state
/// (SPEC_FULL.md supplement: shared-accept relink / override-detach audit
/// trail named in §4.10 but not given a concrete shape in spec.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    /// A shared accept linked an item to a canonical row (new or existing).
    Relinked,
    /// An item override detached the item's link without touching shared state.
    Detached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEvent {
    pub product_id: String,
    pub field_key: String,
    pub canonical_id: Option<String>,
    pub action: LinkAction,
    pub at: DateTime<Utc>,
}
