use async_trait::async_trait;
use std::sync::Mutex;

use super::base::{CompletionRequest, Provider, ProviderError, TextStream};
use crate::models::message::Message;

/// What the mock saw on each call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub streamed: bool,
}

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Mutex<Vec<Message>>,
    chunks: Vec<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses, and the chunks
    /// every streamed completion yields
    pub fn new(responses: Vec<Message>, chunks: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses),
            chunks: chunks.into_iter().map(String::from).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, request: &CompletionRequest<'_>, streamed: bool) {
        self.calls.lock().unwrap().push(RecordedCall {
            model: request.model.to_string(),
            messages: request.messages.to_vec(),
            tool_names: request.tools.iter().map(|tool| tool.name.clone()).collect(),
            streamed,
        });
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, ProviderError> {
        self.record(&request, false);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok(Message::assistant().with_text(""))
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn stream(&self, request: CompletionRequest<'_>) -> Result<TextStream, ProviderError> {
        self.record(&request, true);
        let chunks: Vec<Result<String, ProviderError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
