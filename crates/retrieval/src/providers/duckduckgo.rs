//! DuckDuckGo Instant Answer client, the free web search fallback.

use crate::sources::{WebHit, WebSearch};
use agentrag_core::{AppError, AppResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com";

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    /// Usually a string, an object for some calculator-style answers
    #[serde(default)]
    answer: serde_json::Value,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics", default)]
        topics: Vec<RelatedTopic>,
    },
}

/// Free web search through the DuckDuckGo Instant Answer API.
pub struct DuckDuckGoSearch {
    base_url: String,
    client: reqwest::Client,
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_DUCKDUCKGO_URL)
    }
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("agentrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn convert_response(answer: InstantAnswer, max_results: usize) -> Vec<WebHit> {
        let mut hits = Vec::new();

        if let Some(direct) = answer.answer.as_str().filter(|a| !a.trim().is_empty()) {
            hits.push(WebHit {
                title: answer.heading.clone(),
                snippet: direct.to_string(),
                url: answer.abstract_url.clone(),
            });
        }

        if !answer.abstract_text.trim().is_empty() {
            hits.push(WebHit {
                title: answer.heading.clone(),
                snippet: answer.abstract_text,
                url: answer.abstract_url,
            });
        }

        let mut pending: Vec<RelatedTopic> = answer.related_topics.into_iter().rev().collect();
        while let Some(topic) = pending.pop() {
            match topic {
                RelatedTopic::Topic { text, first_url } if !text.trim().is_empty() => {
                    // Topic text reads "Title - description"
                    let title = text
                        .split_once(" - ")
                        .map(|(title, _)| title.to_string())
                        .unwrap_or_default();
                    hits.push(WebHit {
                        title,
                        snippet: text,
                        url: first_url,
                    });
                }
                RelatedTopic::Topic { .. } => {}
                RelatedTopic::Group { topics } => pending.extend(topics.into_iter().rev()),
            }
        }

        hits.truncate(max_results);
        hits
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebHit>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::Other(format!("Failed to send request to DuckDuckGo: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Other(format!(
                "DuckDuckGo error ({})",
                response.status()
            )));
        }

        // The API answers with an application/x-javascript content type
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Other(format!("Failed to read DuckDuckGo response: {}", e)))?;
        let parsed: InstantAnswer = serde_json::from_str(&body)?;

        Ok(Self::convert_response(parsed, max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_abstract_and_nested_topics() {
        let raw = r#"{
            "Heading": "Bitcoin",
            "AbstractText": "Bitcoin is a decentralized digital currency.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Bitcoin",
            "Answer": "",
            "RelatedTopics": [
                {"Text": "Satoshi Nakamoto - Creator of Bitcoin", "FirstURL": "https://duckduckgo.com/Satoshi"},
                {"Name": "Economics", "Topics": [
                    {"Text": "Cryptocurrency - Digital money", "FirstURL": "https://duckduckgo.com/Crypto"}
                ]},
                {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
            ]
        }"#;
        let parsed: InstantAnswer = serde_json::from_str(raw).unwrap();

        let hits = DuckDuckGoSearch::convert_response(parsed, 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Bitcoin");
        assert_eq!(hits[0].url, "https://en.wikipedia.org/wiki/Bitcoin");
        assert_eq!(hits[1].title, "Satoshi Nakamoto");
        assert_eq!(hits[2].url, "https://duckduckgo.com/Crypto");
    }

    #[test]
    fn test_empty_answer_has_no_hits() {
        let parsed: InstantAnswer = serde_json::from_str("{}").unwrap();
        assert!(DuckDuckGoSearch::convert_response(parsed, 5).is_empty());
    }

    #[test]
    fn test_limit_applies() {
        let raw = r#"{"RelatedTopics": [
            {"Text": "a - 1", "FirstURL": "u1"},
            {"Text": "b - 2", "FirstURL": "u2"},
            {"Text": "c - 3", "FirstURL": "u3"}
        ]}"#;
        let parsed: InstantAnswer = serde_json::from_str(raw).unwrap();
        assert_eq!(DuckDuckGoSearch::convert_response(parsed, 2).len(), 2);
    }
}
