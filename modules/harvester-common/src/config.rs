//! Environment-sourced configuration (§5 environment knobs, §6 external
//! interfaces). Validated eagerly at startup rather than failing mid-run.

use std::env;

use crate::error::{HarvestError, Result};

/// Per-lane concurrency caps (§5: four named lanes, each with a bounded pool).
#[derive(Debug, Clone)]
pub struct LaneConcurrency {
    pub search: usize,
    pub fetch: usize,
    pub parse: usize,
    pub llm: usize,
}

impl Default for LaneConcurrency {
    fn default() -> Self {
        Self {
            search: 4,
            fetch: 8,
            parse: 4,
            llm: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: String,
    pub artifact_dir: String,
    pub output_dir: String,

    pub lane_concurrency: LaneConcurrency,
    pub per_host_min_delay_ms: u64,
    pub fetch_retry_budget: u32,
    pub headless_enabled: bool,
    pub browserless_base_url: Option<String>,
    pub browserless_token: Option<String>,
    pub ocr_enabled: bool,

    pub search_provider_api_key: Option<String>,

    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub llm_token_cap_per_role: u64,

    pub max_rounds: u32,
    pub no_progress_limit: u32,
    pub max_low_quality_rounds: u32,
    pub confidence_gate: f64,
    pub wall_clock_budget_secs: u64,
}

impl Config {
    /// Load from environment variables, applying the same defaults the
    /// teacher uses for optional knobs and panicking with a clear message
    /// only for variables with no sane default.
    pub fn from_env() -> Self {
        let headless_enabled = bool_env("HEADLESS_ENABLED", true);
        let browserless_base_url = env::var("BROWSERLESS_BASE_URL").ok();

        Self {
            store_path: env::var("HARVESTER_STORE_PATH")
                .unwrap_or_else(|_| "harvester.sqlite3".to_string()),
            artifact_dir: env::var("HARVESTER_ARTIFACT_DIR")
                .unwrap_or_else(|_| "artifacts".to_string()),
            output_dir: env::var("HARVESTER_OUTPUT_DIR").unwrap_or_else(|_| "outputs".to_string()),
            lane_concurrency: LaneConcurrency {
                search: usize_env("LANE_CONCURRENCY_SEARCH", 4),
                fetch: usize_env("LANE_CONCURRENCY_FETCH", 8),
                parse: usize_env("LANE_CONCURRENCY_PARSE", 4),
                llm: usize_env("LANE_CONCURRENCY_LLM", 4),
            },
            per_host_min_delay_ms: env::var("PER_HOST_MIN_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            fetch_retry_budget: env::var("FETCH_RETRY_BUDGET")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            headless_enabled,
            browserless_base_url,
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            ocr_enabled: bool_env("OCR_ENABLED", false),
            search_provider_api_key: env::var("SEARCH_PROVIDER_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            llm_token_cap_per_role: env::var("LLM_TOKEN_CAP_PER_ROLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200_000),
            max_rounds: env::var("MAX_ROUNDS").ok().and_then(|v| v.parse().ok()).unwrap_or(8),
            no_progress_limit: env::var("NO_PROGRESS_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            max_low_quality_rounds: env::var("MAX_LOW_QUALITY_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            confidence_gate: env::var("CONFIDENCE_GATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.75),
            wall_clock_budget_secs: env::var("WALL_CLOCK_BUDGET_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1800),
        }
    }

    /// Validate mutually-exclusive/required knobs before a run begins
    /// (SPEC_FULL.md ambient addition) rather than failing mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.headless_enabled && self.browserless_base_url.is_none() {
            return Err(HarvestError::Config(
                "HEADLESS_ENABLED=true requires BROWSERLESS_BASE_URL".to_string(),
            ));
        }
        if self.confidence_gate < 0.0 || self.confidence_gate > 1.0 {
            return Err(HarvestError::Config(
                "CONFIDENCE_GATE must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Log the presence (not value) of sensitive env vars for debugging.
    pub fn log_redacted(&self) {
        let flags = [
            ("ANTHROPIC_API_KEY", self.anthropic_api_key.is_some()),
            ("OPENAI_API_KEY", self.openai_api_key.is_some()),
            ("SEARCH_PROVIDER_API_KEY", self.search_provider_api_key.is_some()),
            ("BROWSERLESS_BASE_URL", self.browserless_base_url.is_some()),
        ];
        for (name, present) in flags {
            tracing::info!(var = name, present, "config knob");
        }
    }
}

fn bool_env(name: &str, default: bool) -> bool {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn usize_env(name: &str, default: usize) -> usize {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
