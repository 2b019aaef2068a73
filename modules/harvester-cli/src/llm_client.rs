//! Adapts `ai-client`'s provider clients to the router's local `LlmClient`
//! contract, the same "wrap the concrete client behind a small trait"
//! shape as `rootsignal-scout-supervisor`'s notify backend: a `Noop`
//! implementation ships first, a real provider slots in once credentials
//! are configured, with no change to the caller.

use async_trait::async_trait;
use harvester_llm::router::{LlmClient, RawCompletion};

/// No credentials configured: every call fails cleanly so the router's
/// fallback/budget bookkeeping still runs, it just never succeeds.
pub struct NullLlmClient;

#[async_trait]
impl LlmClient for NullLlmClient {
    async fn complete(&self, _model: &str, _system: &str, _prompt: &str) -> Result<RawCompletion, String> {
        Err("no LLM provider configured".to_string())
    }
}

pub struct ClaudeLlmClient {
    api_key: String,
}

impl ClaudeLlmClient {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl LlmClient for ClaudeLlmClient {
    async fn complete(&self, model: &str, system: &str, prompt: &str) -> Result<RawCompletion, String> {
        use ai_client::{Agent, PromptBuilder};

        let agent = ai_client::Claude::new(self.api_key.clone(), model.to_string());
        let text = agent
            .prompt(prompt)
            .preamble(system)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(RawCompletion {
            prompt_tokens: estimate_tokens(prompt),
            completion_tokens: estimate_tokens(&text),
            text,
        })
    }
}

pub struct OpenAiLlmClient {
    api_key: String,
}

impl OpenAiLlmClient {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn complete(&self, model: &str, system: &str, prompt: &str) -> Result<RawCompletion, String> {
        use ai_client::{Agent, PromptBuilder};

        let agent = ai_client::OpenAi::new(self.api_key.clone(), model.to_string());
        let text = agent
            .prompt(prompt)
            .preamble(system)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(RawCompletion {
            prompt_tokens: estimate_tokens(prompt),
            completion_tokens: estimate_tokens(&text),
            text,
        })
    }
}

fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64 / 4).max(1)
}
