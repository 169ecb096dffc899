use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::SearchResult;
use crate::providers::utils::extract_error_message;

pub const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

const MAX_RESULTS: u32 = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Unable to connect to search service")]
    Connection(String),

    #[error("Invalid Tavily API key. Please check your API key in settings.")]
    Authentication,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Search service temporarily unavailable")]
    Unexpected(String),
}

impl SearchError {
    /// HTTP status of the failed call, 0 when nothing came back
    pub fn status(&self) -> u16 {
        match self {
            SearchError::Connection(_) | SearchError::Unexpected(_) => 0,
            SearchError::Authentication => 401,
            SearchError::Api { status, .. } => *status,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            SearchError::Connection(_) => "connection",
            SearchError::Authentication => "authentication",
            SearchError::Api { .. } => "api",
            SearchError::Unexpected(_) => "unexpected",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

/// Client for the Tavily search API
#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl TavilyClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Unexpected(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        debug!(query = %query, "running web search");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "search_depth": "basic",
                "max_results": MAX_RESULTS,
                "include_answer": false,
                "include_raw_content": false,
            }))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "search request failed");
                SearchError::Connection(e.to_string())
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SearchError::Authentication);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| extract_error_message(&value))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: RawResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Unexpected(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .map(|raw| SearchResult {
                title: raw.title.unwrap_or_default(),
                url: raw.url.unwrap_or_default(),
                content: raw.content.unwrap_or_default(),
                score: raw.score.unwrap_or(0.0),
            })
            .collect())
    }
}
