//! SerpAPI Google search client.

use crate::sources::{WebHit, WebSearch};
use agentrag_core::{AppError, AppResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_SERPAPI_URL: &str = "https://serpapi.com";

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Paid web search through SerpAPI.
pub struct SerpApiSearch {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SerpApiSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_SERPAPI_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn convert_response(response: SearchResponse, max_results: usize) -> AppResult<Vec<WebHit>> {
        if let Some(error) = response.error {
            // SerpAPI reports "no results" as an error string
            if error.contains("hasn't returned any results") {
                return Ok(Vec::new());
            }
            return Err(AppError::Other(format!("SerpAPI error: {}", error)));
        }

        Ok(response
            .organic_results
            .into_iter()
            .take(max_results)
            .map(|r| WebHit {
                title: r.title,
                snippet: r.snippet,
                url: r.link,
            })
            .collect())
    }
}

#[async_trait]
impl WebSearch for SerpApiSearch {
    fn name(&self) -> &str {
        "serpapi"
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebHit>> {
        let url = format!("{}/search.json", self.base_url);
        let num = max_results.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Other(format!("Failed to send request to SerpAPI: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Other(format!(
                "SerpAPI error ({}): {}",
                status, error_text
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Other(format!("Failed to parse SerpAPI response: {}", e)))?;

        Self::convert_response(parsed, max_results)
    }
}
