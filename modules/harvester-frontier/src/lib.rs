pub mod frontier;
pub mod types;

pub use frontier::Frontier;
pub use types::{FrontierDecision, HostPolicy, RepairSpec};
