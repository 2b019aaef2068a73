use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReviewError>;
