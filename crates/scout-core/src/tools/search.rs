use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::llm::describe_reqwest;
use crate::{ScoutError, SecretValue, ToolError, truncate_chars};

const SNIPPET_MAX_CHARS: usize = 500;

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// External search backend used by `web_search`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError>;

    fn name(&self) -> &str;
}

/// Tavily search API client.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: SecretValue,
    base_url: String,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    pub fn new(
        api_key: SecretValue,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ScoutError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                ScoutError::InvalidConfiguration(format!("search client init failed: {err}"))
            })?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn parse_hits(payload: TavilyResponse, max_results: usize) -> Vec<SearchHit> {
        payload
            .results
            .into_iter()
            .filter(|result| !result.url.is_empty())
            .take(max_results)
            .map(|result| SearchHit {
                title: if result.title.trim().is_empty() {
                    result.url.clone()
                } else {
                    result.title.trim().to_string()
                },
                snippet: truncate_chars(result.content.trim(), SNIPPET_MAX_CHARS),
                url: result.url,
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&json!({
                "query": query,
                "max_results": max_results,
                "search_depth": "basic",
            }))
            .send()
            .await
            .map_err(|err| ToolError::Network(describe_reqwest(&err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Provider {
                status: Some(status.as_u16()),
                message: truncate_chars(body.trim(), 300),
            });
        }

        let payload: TavilyResponse = response.json().await.map_err(|err| ToolError::Provider {
            status: Some(status.as_u16()),
            message: format!("undecodable search response: {err}"),
        })?;
        let hits = Self::parse_hits(payload, max_results);
        debug!(query = %query, hits = hits.len(), "search completed");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

/// Stand-in used when no search credential is configured.
pub struct UnconfiguredSearch {
    key_env: String,
}

impl UnconfiguredSearch {
    pub fn new(key_env: &str) -> Self {
        Self {
            key_env: key_env.to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for UnconfiguredSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        Err(ToolError::Provider {
            status: None,
            message: format!(
                "web search is not configured (set {}); try web_scrape on a known URL instead",
                self.key_env
            ),
        })
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}
