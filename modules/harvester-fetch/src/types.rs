use harvester_common::{CrawlStatus, FetchMethod};

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: CrawlStatus,
    pub http_status: Option<u16>,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub method: FetchMethod,
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn interrupted(method: FetchMethod) -> Self {
        Self {
            status: CrawlStatus::Interrupted,
            http_status: None,
            body: None,
            content_type: None,
            method,
            error: None,
        }
    }
}

/// Reasons the fallback policy escalates static HTTP to headless (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationReason {
    Forbidden,
    ContentTypeMismatch,
    JsRequiredHeuristic,
    Timeout,
}
