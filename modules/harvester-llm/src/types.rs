//! LLM Router types (§4.8): roles, per-role config, and trace records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Plan,
    Fast,
    Triage,
    Reasoning,
    Extract,
    Validate,
    Write,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Plan => "plan",
            Role::Fast => "fast",
            Role::Triage => "triage",
            Role::Reasoning => "reasoning",
            Role::Extract => "extract",
            Role::Validate => "validate",
            Role::Write => "write",
        }
    }
}

/// Per-role model configuration, set up once at startup from `Config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    pub role: Role,
    pub primary_model: String,
    pub fallback_model: Option<String>,
    pub token_budget: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ok,
    SchemaRetried,
    Failed,
    BudgetExhausted,
}

/// A single LLM call's audit trail. `prompt_preview`/`response_preview` are
/// truncated, never the full payload, so traces stay cheap to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallTrace {
    pub role: Role,
    pub model: String,
    pub prompt_preview: String,
    pub response_preview: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub status: CallStatus,
    pub called_at: DateTime<Utc>,
}

const PREVIEW_CHARS: usize = 400;

pub fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}…")
    }
}
