use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("client error: {0}")]
    Client(String),

    #[error("schema validation failed twice for role {role}: {detail}")]
    SchemaFailed { role: &'static str, detail: String },

    #[error("token budget exhausted for role {0}")]
    BudgetExhausted(&'static str),

    #[error("no role config registered for {0}")]
    UnknownRole(&'static str),
}

pub type Result<T> = std::result::Result<T, LlmError>;
