//! Role-based model routing (§4.8): one router per run, fanning calls out
//! to whichever provider client is wired in, enforcing per-role token
//! budgets, and recording a trace for every call regardless of outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ai_client::StructuredOutput;
use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::budget::TokenBudget;
use crate::error::{LlmError, Result};
use crate::types::{preview, CallStatus, CallTrace, Role, RoleConfig};

/// A single round-trip to a provider. Providers (Claude, OpenAI, ...) are
/// adapted to this trait so the router stays provider-agnostic; see
/// `ai-client` for the concrete `Claude`/`OpenAi` clients it wraps.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> std::result::Result<RawCompletion, String>;
}

#[derive(Debug, Clone)]
pub struct RawCompletion {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Router state: per-role model configuration, a shared token budget, the
/// wrapped client, and an append-only trace log (SPEC_FULL.md: a separate
/// audit concern from `tracing`, kept in-process here and flushed by the
/// orchestrator into the run's event stream).
pub struct Router {
    roles: HashMap<Role, RoleConfig>,
    budget: TokenBudget,
    client: Arc<dyn LlmClient>,
    traces: Mutex<Vec<CallTrace>>,
}

impl Router {
    pub fn new(roles: Vec<RoleConfig>, client: Arc<dyn LlmClient>) -> Self {
        let mut limits = HashMap::new();
        let mut by_role = HashMap::new();
        for cfg in roles {
            limits.insert(cfg.role, cfg.token_budget);
            by_role.insert(cfg.role, cfg);
        }
        Self {
            roles: by_role,
            budget: TokenBudget::new(limits),
            client,
            traces: Mutex::new(Vec::new()),
        }
    }

    pub fn traces(&self) -> Vec<CallTrace> {
        self.traces.lock().unwrap().clone()
    }

    fn role_config(&self, role: Role) -> Result<&RoleConfig> {
        self.roles.get(&role).ok_or(LlmError::UnknownRole(role.as_str()))
    }

    fn record(&self, trace: CallTrace) {
        self.traces.lock().unwrap().push(trace);
    }

    /// Plain-text completion for roles with no structured contract (e.g.
    /// `plan`, `write`). Falls back to the role's fallback model once if the
    /// primary call errors.
    pub async fn call_text(&self, role: Role, system: &str, prompt: &str) -> Result<String> {
        let cfg = self.role_config(role)?;

        if !self.budget.has_headroom(role, estimate_tokens(prompt)) {
            self.record(failed_trace(role, &cfg.primary_model, prompt, "budget exhausted"));
            return Err(LlmError::BudgetExhausted(role.as_str()));
        }

        match self.client.complete(&cfg.primary_model, system, prompt).await {
            Ok(completion) => {
                self.budget
                    .record_spend(role, completion.prompt_tokens + completion.completion_tokens);
                self.record(ok_trace(role, &cfg.primary_model, prompt, &completion, CallStatus::Ok));
                Ok(completion.text)
            }
            Err(primary_err) => self.call_text_fallback(role, cfg, system, prompt, &primary_err).await,
        }
    }

    async fn call_text_fallback(
        &self,
        role: Role,
        cfg: &RoleConfig,
        system: &str,
        prompt: &str,
        primary_err: &str,
    ) -> Result<String> {
        let Some(fallback_model) = cfg.fallback_model.as_deref() else {
            self.record(failed_trace(role, &cfg.primary_model, prompt, primary_err));
            return Err(LlmError::Client(primary_err.to_string()));
        };

        warn!(role = role.as_str(), primary_err, fallback_model, "primary model failed, trying fallback");
        match self.client.complete(fallback_model, system, prompt).await {
            Ok(completion) => {
                self.budget
                    .record_spend(role, completion.prompt_tokens + completion.completion_tokens);
                self.record(ok_trace(role, fallback_model, prompt, &completion, CallStatus::Ok));
                Ok(completion.text)
            }
            Err(fallback_err) => {
                self.record(failed_trace(role, fallback_model, prompt, &fallback_err));
                Err(LlmError::Client(fallback_err))
            }
        }
    }

    /// Structured-output extraction/validation (roles `extract`, `validate`,
    /// `triage`, ...). Retries once without the schema instruction on a
    /// parse failure; a second failure is terminal for this call and the
    /// caller is expected to degrade to deterministic extraction.
    pub async fn call_schema<T: StructuredOutput>(
        &self,
        role: Role,
        system: &str,
        prompt: &str,
    ) -> Result<T> {
        let cfg = self.role_config(role)?;

        if !self.budget.has_headroom(role, estimate_tokens(prompt)) {
            self.record(failed_trace(role, &cfg.primary_model, prompt, "budget exhausted"));
            return Err(LlmError::BudgetExhausted(role.as_str()));
        }

        let schema = T::openai_schema();
        let schema_prompt = format!("{prompt}\n\nRespond with JSON matching this schema:\n{schema}");

        let first = self.client.complete(&cfg.primary_model, system, &schema_prompt).await;
        if let Ok(completion) = &first {
            self.budget
                .record_spend(role, completion.prompt_tokens + completion.completion_tokens);
            if let Ok(value) = serde_json::from_str::<T>(&completion.text) {
                self.record(ok_trace(role, &cfg.primary_model, prompt, completion, CallStatus::Ok));
                return Ok(value);
            }
        }

        // Retry once without the schema instruction, still parsed as JSON.
        warn!(role = role.as_str(), "schema call failed to parse, retrying without schema instruction");
        let retry = self.client.complete(&cfg.primary_model, system, prompt).await;
        if let Ok(completion) = &retry {
            self.budget
                .record_spend(role, completion.prompt_tokens + completion.completion_tokens);
            if let Ok(value) = serde_json::from_str::<T>(&completion.text) {
                self.record(ok_trace(role, &cfg.primary_model, prompt, completion, CallStatus::SchemaRetried));
                return Ok(value);
            }
        }

        self.record(failed_trace(role, &cfg.primary_model, prompt, "schema validation failed twice"));
        Err(LlmError::SchemaFailed {
            role: role.as_str(),
            detail: "response did not parse into the requested schema after retry".to_string(),
        })
    }
}

fn estimate_tokens(prompt: &str) -> u64 {
    // Rough chars/4 heuristic; good enough for a headroom pre-check, the
    // real spend is recorded from the provider's reported usage.
    (prompt.chars().count() as u64 / 4).max(1)
}

fn ok_trace(role: Role, model: &str, prompt: &str, completion: &RawCompletion, status: CallStatus) -> CallTrace {
    CallTrace {
        role,
        model: model.to_string(),
        prompt_preview: preview(prompt),
        response_preview: preview(&completion.text),
        prompt_tokens: completion.prompt_tokens,
        completion_tokens: completion.completion_tokens,
        status,
        called_at: Utc::now(),
    }
}

fn failed_trace(role: Role, model: &str, prompt: &str, detail: &str) -> CallTrace {
    CallTrace {
        role,
        model: model.to_string(),
        prompt_preview: preview(prompt),
        response_preview: preview(detail),
        prompt_tokens: 0,
        completion_tokens: 0,
        status: CallStatus::Failed,
        called_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
    struct Extracted {
        value: String,
    }

    struct StubClient {
        responses: Vec<std::result::Result<RawCompletion, String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for StubClient {
        async fn complete(
            &self,
            _model: &str,
            _system: &str,
            _prompt: &str,
        ) -> std::result::Result<RawCompletion, String> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(i)
                .cloned()
                .unwrap_or_else(|| Err("no more stubbed responses".to_string()))
        }
    }

    fn role_cfg(role: Role, fallback: Option<&str>) -> RoleConfig {
        RoleConfig {
            role,
            primary_model: "primary-model".to_string(),
            fallback_model: fallback.map(|s| s.to_string()),
            token_budget: 10_000,
        }
    }

    fn ok(text: &str) -> std::result::Result<RawCompletion, String> {
        Ok(RawCompletion {
            text: text.to_string(),
            prompt_tokens: 10,
            completion_tokens: 10,
        })
    }

    #[tokio::test]
    async fn call_schema_parses_on_first_try() {
        let client = Arc::new(StubClient {
            responses: vec![ok(r#"{"value":"Focus Pro 35K"}"#)],
            calls: AtomicUsize::new(0),
        });
        let router = Router::new(vec![role_cfg(Role::Extract, None)], client);
        let result: Extracted = router.call_schema(Role::Extract, "sys", "extract sensor").await.unwrap();
        assert_eq!(result.value, "Focus Pro 35K");
        assert_eq!(router.traces().len(), 1);
        assert_eq!(router.traces()[0].status, CallStatus::Ok);
    }

    #[tokio::test]
    async fn call_schema_retries_without_schema_then_succeeds() {
        let client = Arc::new(StubClient {
            responses: vec![ok("not json at all"), ok(r#"{"value":"60 g"}"#)],
            calls: AtomicUsize::new(0),
        });
        let router = Router::new(vec![role_cfg(Role::Extract, None)], client);
        let result: Extracted = router.call_schema(Role::Extract, "sys", "extract weight").await.unwrap();
        assert_eq!(result.value, "60 g");
        assert_eq!(router.traces().last().unwrap().status, CallStatus::SchemaRetried);
    }

    #[tokio::test]
    async fn call_schema_fails_after_second_bad_response() {
        let client = Arc::new(StubClient {
            responses: vec![ok("nope"), ok("still nope")],
            calls: AtomicUsize::new(0),
        });
        let router = Router::new(vec![role_cfg(Role::Extract, None)], client);
        let result = router.call_schema::<Extracted>(Role::Extract, "sys", "extract").await;
        assert!(matches!(result, Err(LlmError::SchemaFailed { .. })));
        assert_eq!(router.traces().last().unwrap().status, CallStatus::Failed);
    }

    #[tokio::test]
    async fn call_text_falls_back_to_secondary_model_on_primary_error() {
        let client = Arc::new(StubClient {
            responses: vec![Err("primary down".to_string()), ok("plan text from fallback")],
            calls: AtomicUsize::new(0),
        });
        let router = Router::new(vec![role_cfg(Role::Plan, Some("fallback-model"))], client);
        let text = router.call_text(Role::Plan, "sys", "plan queries").await.unwrap();
        assert_eq!(text, "plan text from fallback");
        assert_eq!(router.traces().last().unwrap().model, "fallback-model");
    }

    #[tokio::test]
    async fn exhausted_budget_short_circuits_before_calling_client() {
        let client = Arc::new(StubClient {
            responses: vec![],
            calls: AtomicUsize::new(0),
        });
        let mut cfg = role_cfg(Role::Fast, None);
        cfg.token_budget = 0;
        let router = Router::new(vec![cfg], client);
        let result = router.call_text(Role::Fast, "sys", "anything").await;
        assert!(matches!(result, Err(LlmError::BudgetExhausted(_))));
    }
}
