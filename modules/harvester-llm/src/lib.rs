pub mod budget;
pub mod error;
pub mod router;
pub mod types;

pub use budget::TokenBudget;
pub use error::{LlmError, Result};
pub use router::{LlmClient, RawCompletion, Router};
pub use types::{preview, CallStatus, CallTrace, Role, RoleConfig};
