use serde::{Deserialize, Serialize};

/// Scope a search or document listing to a slice of the evidence graph (§4.1).
#[derive(Debug, Clone)]
pub enum Scope {
    Run(String),
    Product(String),
    Category(String),
}

impl Scope {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Scope::Run(_) => "run_id",
            Scope::Product(_) => "product_id",
            Scope::Category(_) => "category",
        }
    }

    pub(crate) fn value(&self) -> &str {
        match self {
            Scope::Run(v) | Scope::Product(v) | Scope::Category(v) => v,
        }
    }
}

/// Outcome of `put`, surfaced to the caller and mirrored in an event (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PutStatus {
    New,
    Reused,
    Updated,
}

impl PutStatus {
    pub fn event_name(&self) -> &'static str {
        match self {
            PutStatus::New => "indexed_new",
            PutStatus::Reused => "dedupe_hit",
            PutStatus::Updated => "dedupe_updated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResult {
    pub snippet_id: String,
    pub status: PutStatus,
}

/// One occurrence attached to a `put` call. A snippet may carry many.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceMeta {
    pub run_id: Option<String>,
    pub product_id: Option<String>,
    pub category: Option<String>,
    pub field_key: Option<String>,
    pub assertion_id: Option<String>,
    pub tier: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub snippet_id: String,
    pub source_id: String,
    pub field_key: Option<String>,
    pub assertion_id: Option<String>,
    pub tier: Option<i32>,
    pub highlighted_quote: String,
    pub snippet_preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub source_id: String,
    pub artifact_count: i64,
    pub unique_hash_count: i64,
}
