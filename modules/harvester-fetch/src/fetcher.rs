//! Static HTTP and headless fetchers, composed behind a fallback policy.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use browserless_client::BrowserlessClient;
use harvester_common::{CrawlStatus, FetchMethod};
use tracing::{info, warn};

use crate::fallback::FallbackPolicy;
use crate::types::FetchOutcome;

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome>;
    fn method(&self) -> FetchMethod;
}

pub struct StaticHttpFetcher {
    client: reqwest::Client,
}

impl StaticHttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("harvester/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for StaticHttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for StaticHttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        info!(url, fetcher = "static_http", "fetching");

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Ok(FetchOutcome {
                    status: CrawlStatus::BadContent,
                    http_status: None,
                    body: None,
                    content_type: None,
                    method: FetchMethod::StaticHttp,
                    error: Some("timeout".into()),
                });
            }
            Err(e) => {
                warn!(url, error = %e, "static http fetch failed");
                return Ok(FetchOutcome {
                    status: CrawlStatus::BadContent,
                    http_status: None,
                    body: None,
                    content_type: None,
                    method: FetchMethod::StaticHttp,
                    error: Some(e.to_string()),
                });
            }
        };

        let http_status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let status = classify_http_status(http_status);
        let body = response.text().await.ok();

        Ok(FetchOutcome {
            status,
            http_status: Some(http_status),
            body,
            content_type,
            method: FetchMethod::StaticHttp,
            error: None,
        })
    }

    fn method(&self) -> FetchMethod {
        FetchMethod::StaticHttp
    }
}

pub struct HeadlessFetcher {
    client: BrowserlessClient,
}

impl HeadlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            client: BrowserlessClient::new(base_url, token),
        }
    }
}

#[async_trait]
impl Fetcher for HeadlessFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        info!(url, fetcher = "headless", "fetching");
        match self.client.content(url).await {
            Ok(html) if !html.trim().is_empty() => Ok(FetchOutcome {
                status: CrawlStatus::Ok,
                http_status: Some(200),
                body: Some(html),
                content_type: Some("text/html".into()),
                method: FetchMethod::Headless,
                error: None,
            }),
            Ok(_) => Ok(FetchOutcome {
                status: CrawlStatus::BadContent,
                http_status: Some(200),
                body: None,
                content_type: None,
                method: FetchMethod::Headless,
                error: Some("empty rendered DOM".into()),
            }),
            Err(e) => {
                warn!(url, error = %e, "headless fetch failed");
                Ok(FetchOutcome {
                    status: CrawlStatus::BadContent,
                    http_status: None,
                    body: None,
                    content_type: None,
                    method: FetchMethod::Headless,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    fn method(&self) -> FetchMethod {
        FetchMethod::Headless
    }
}

/// Tries static HTTP first, escalating to headless when `FallbackPolicy`
/// judges the static response insufficient.
pub struct FallbackFetcher {
    primary: StaticHttpFetcher,
    headless: Option<HeadlessFetcher>,
    policy: FallbackPolicy,
}

impl FallbackFetcher {
    pub fn new(headless: Option<HeadlessFetcher>) -> Self {
        Self {
            primary: StaticHttpFetcher::new(),
            headless,
            policy: FallbackPolicy::new(),
        }
    }
}

#[async_trait]
impl Fetcher for FallbackFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        let outcome = self.primary.fetch(url).await?;

        let timed_out = outcome.error.as_deref() == Some("timeout");
        let escalate = self.policy.should_escalate(
            outcome.http_status,
            outcome.content_type.as_deref(),
            outcome.body.as_deref(),
            timed_out,
        );

        match (escalate, &self.headless) {
            (Some(reason), Some(headless)) => {
                info!(url, ?reason, "escalating to headless fetch");
                headless.fetch(url).await
            }
            _ => Ok(outcome),
        }
    }

    fn method(&self) -> FetchMethod {
        FetchMethod::StaticHttp
    }
}

fn classify_http_status(status: u16) -> CrawlStatus {
    match status {
        200..=299 => CrawlStatus::Ok,
        403 | 429 => CrawlStatus::Blocked,
        404 => CrawlStatus::NotFound,
        _ => CrawlStatus::BadContent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_http_status_maps_ranges() {
        assert_eq!(classify_http_status(200), CrawlStatus::Ok);
        assert_eq!(classify_http_status(403), CrawlStatus::Blocked);
        assert_eq!(classify_http_status(429), CrawlStatus::Blocked);
        assert_eq!(classify_http_status(404), CrawlStatus::NotFound);
        assert_eq!(classify_http_status(500), CrawlStatus::BadContent);
    }
}
