//! `summary.json` (§6 external interfaces): the one artifact every run
//! writes regardless of how it ends, so a caller never has to replay the
//! event stream just to learn the headline outcome.

use serde::{Deserialize, Serialize};

use crate::types::StopReason;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub product_id: String,
    pub rounds_completed: u32,
    pub status: String,
    pub stop_reason: Option<String>,
    pub fields_validated: u64,
    pub sources_fetched: u64,
    pub automation_jobs_emitted: u32,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl RunSummary {
    /// §8 boundary: a run with zero sources ever fetched is `no_sources`,
    /// never `completed`/`failed` — but an explicit cancellation always
    /// reports `cancelled`, even if it happened before any source was
    /// fetched, since `interrupted` (§7) is a distinct terminal outcome
    /// from the zero-source boundary case.
    pub fn status_for(stop_reason: Option<StopReason>, sources_fetched: u64) -> &'static str {
        if matches!(stop_reason, Some(StopReason::Cancelled)) {
            return "cancelled";
        }
        if sources_fetched == 0 {
            return "no_sources";
        }
        "completed"
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("RunSummary is always representable as JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sources_overrides_any_stop_reason() {
        assert_eq!(
            RunSummary::status_for(Some(StopReason::AllRequiredFieldsValidated), 0),
            "no_sources"
        );
    }

    #[test]
    fn cancellation_is_reported_distinctly() {
        assert_eq!(RunSummary::status_for(Some(StopReason::Cancelled), 12), "cancelled");
    }

    #[test]
    fn ordinary_stop_reasons_report_completed() {
        assert_eq!(RunSummary::status_for(Some(StopReason::MaxRoundsReached), 12), "completed");
    }
}
