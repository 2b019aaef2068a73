pub type Result<T> = std::result::Result<T, EvidenceError>;

#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("snippet content hash did not match stored bytes: {0}")]
    QuarantinedHash(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
