//! Search provider abstraction, grounded in the teacher's `WebSearcher`/
//! `TavilySearcher` adapter shape.

use async_trait::async_trait;

use crate::types::SerpResult;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> anyhow::Result<Vec<SerpResult>>;
    fn name(&self) -> &str;
}

pub struct TavilyProvider {
    api_key: String,
    client: reqwest::Client,
}

impl TavilyProvider {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }
}

#[derive(serde::Serialize)]
struct TavilyRequest {
    api_key: String,
    query: String,
    max_results: u32,
    include_raw_content: bool,
    search_depth: String,
}

#[derive(serde::Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(serde::Deserialize)]
struct TavilyResult {
    url: String,
    title: String,
    content: String,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(&self, query: &str, max_results: u32) -> anyhow::Result<Vec<SerpResult>> {
        let request = TavilyRequest {
            api_key: self.api_key.clone(),
            query: query.to_string(),
            max_results,
            include_raw_content: false,
            search_depth: "advanced".to_string(),
        };

        let resp: TavilyResponse = self
            .client
            .post("https://api.tavily.com/search")
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        Ok(resp
            .results
            .into_iter()
            .map(|r| SerpResult {
                url: r.url,
                title: r.title,
                snippet: r.content,
                provider: "tavily".to_string(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "tavily"
    }
}
