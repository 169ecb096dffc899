use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::models::message::Message;
use crate::models::tool::Tool;

/// Failure talking to a completion endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() || err.is_body() {
            ProviderError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Connection(err.to_string())
        }
    }
}

/// Incremental text of a streamed completion
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

/// One chat completion call
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    /// Offered tools; an empty slice sends no tools at all
    pub tools: &'a [Tool],
    pub temperature: Option<f64>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [Message]) -> Self {
        Self {
            model,
            messages,
            tools: &[],
            temperature: None,
        }
    }

    pub fn with_tools(mut self, tools: &'a [Tool]) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Base trait for chat completion transports
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message, which may carry tool calls
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, ProviderError>;

    /// Generate the next message as a stream of text deltas
    async fn stream(&self, request: CompletionRequest<'_>) -> Result<TextStream, ProviderError>;
}
