use thiserror::Error;

/// Top-level error taxonomy (§7). Component crates define their own typed
/// errors and convert into this one at the orchestrator boundary.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("transient network error: {0}")]
    Transient(String),

    #[error("policy error (no retry): {0}")]
    Policy(String),

    #[error("structural error (no retry): {0}")]
    Structural(String),

    #[error("bad content (quarantined): {0}")]
    BadContent(String),

    #[error("schema validation failed: {0}")]
    Schema(String),

    #[error("budget exhausted: {0}")]
    Budget(String),

    #[error("run interrupted")]
    Interrupted,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
