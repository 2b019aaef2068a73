//! Run Orchestrator (C12, §4.12): composes every other subsystem into the
//! eight-step round loop and decides when a run is done.

pub mod convergence;
pub mod orchestrator;
pub mod ports;
pub mod summary;
pub mod types;

pub use orchestrator::{Cancellation, Orchestrator};
pub use ports::{ConsensusRoundSummary, FetchRoundSummary, RoundPorts};
pub use summary::RunSummary;
pub use types::{ConvergenceState, RoundSignal, StopReason};
