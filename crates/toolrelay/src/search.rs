//! The built-in `web_search` capability
pub mod tavily;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::tool::{Provenance, Tool};

pub use tavily::{SearchError, TavilyClient, TAVILY_SEARCH_URL};

pub const WEB_SEARCH_TOOL_NAME: &str = "web_search";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Tool content returned to the model after a successful search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchToolResponse {
    pub results: Vec<FormattedSearchResult>,
    pub sources: String,
}

/// Arguments the model passes to `web_search`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchArguments {
    pub query: String,
}

pub fn format_search_results(results: &[SearchResult]) -> SearchToolResponse {
    let formatted = results
        .iter()
        .map(|result| FormattedSearchResult {
            title: result.title.clone(),
            url: result.url.clone(),
            snippet: result.content.clone(),
        })
        .collect();

    let sources = results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("[{}] {} - {}", i + 1, result.title, result.url))
        .collect::<Vec<_>>()
        .join("\n");

    SearchToolResponse {
        results: formatted,
        sources,
    }
}

pub fn web_search_tool() -> Tool {
    Tool::new(
        WEB_SEARCH_TOOL_NAME,
        "Search the web for current information about a topic. Use this when you need \
         up-to-date information or facts you don't know.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find information about"
                }
            },
            "required": ["query"]
        }),
        Provenance::BuiltinSearch,
    )
}
