//! Core types for the event store. Domain-agnostic.
//!
//! Mirrors the external NDJSON event stream shape (§6: `ts`, `stage`,
//! `event`, `scope`, `payload`) while keeping the causal-chain columns
//! (`seq`, `parent_seq`, `caused_by_seq`) the dispatch engine relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event as stored in SQLite. Returned by all read methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub seq: i64,
    pub ts: DateTime<Utc>,
    pub stage: String,
    pub event: String,
    pub scope: String,
    pub parent_seq: Option<i64>,
    pub caused_by_seq: Option<i64>,
    pub run_id: Option<String>,
    pub actor: Option<String>,
    pub payload: serde_json::Value,
    pub schema_v: i16,
}

/// An event to be appended. The caller builds this; the store assigns seq/ts.
#[derive(Debug, Clone)]
pub struct AppendEvent {
    pub stage: String,
    pub event: String,
    pub scope: String,
    pub payload: serde_json::Value,
    pub run_id: Option<String>,
    pub actor: Option<String>,
    pub schema_v: i16,
}

impl AppendEvent {
    pub fn new(
        stage: impl Into<String>,
        event: impl Into<String>,
        scope: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            stage: stage.into(),
            event: event.into(),
            scope: scope.into(),
            payload,
            run_id: None,
            actor: None,
            schema_v: 1,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// `event_type` string stored for filtering, e.g. `"fetch:finished"`.
    pub fn event_type(&self) -> String {
        format!("{}:{}", self.stage, self.event)
    }
}

impl StoredEvent {
    pub fn event_type(&self) -> String {
        format!("{}:{}", self.stage, self.event)
    }

    /// Render as one line of the `logs/events.jsonl.gz` stream (§6).
    pub fn to_ndjson_line(&self) -> serde_json::Value {
        serde_json::json!({
            "ts": self.ts,
            "stage": self.stage,
            "event": self.event,
            "scope": self.scope,
            "payload": self.payload,
        })
    }
}
