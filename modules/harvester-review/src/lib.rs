//! Review State Machine (C10, §4.10): two independent lanes (item `grid_key`
//! and shared `component_key`/`enum_key`) modeled as a closed sum type with
//! total transition functions, plus the cross-key linking behavior shared
//! lane accepts and item overrides trigger (§3 invariants 3–4).

pub mod error;
pub mod linking;
pub mod store;
pub mod transitions;
pub mod types;

pub use error::{Result, ReviewError};
pub use linking::CanonicalRegistry;
pub use store::ReviewStore;
pub use types::{AuditEvent, Lane, LinkAction, LinkEvent, ReviewAction, ReviewState, TargetKey};
