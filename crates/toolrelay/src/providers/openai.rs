use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::base::{CompletionRequest, Provider, ProviderError, TextStream};
use super::configs::ProviderConfig;
use super::utils::{
    extract_error_message, messages_to_openai_spec, openai_response_to_message, sse_text_stream,
    tools_to_openai_spec,
};
use crate::models::message::Message;

/// Chat completions client for OpenAI and every endpoint that speaks its protocol
pub struct OpenAiProvider {
    client: Client,
    /// Bounds a whole completion, or each wait of a stream
    timeout: Duration,
    host: String,
    api_key: String,
    organization: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            client,
            timeout,
            host: config.host().to_string(),
            api_key: config.api_key().to_string(),
            organization: config.organization().map(str::to_string),
        })
    }

    fn payload(&self, request: &CompletionRequest<'_>, stream: bool) -> Result<Value, ProviderError> {
        let mut payload = json!({
            "model": request.model,
            "messages": messages_to_openai_spec(request.messages)?,
        });

        let object = payload
            .as_object_mut()
            .ok_or_else(|| ProviderError::InvalidResponse("payload is not an object".into()))?;
        if !request.tools.is_empty() {
            object.insert("tools".to_string(), json!(tools_to_openai_spec(request.tools)));
        }
        if let Some(temperature) = request.temperature {
            object.insert("temperature".to_string(), json!(temperature));
        }
        if stream {
            object.insert("stream".to_string(), json!(true));
        }

        Ok(payload)
    }

    fn request(&self, payload: &Value) -> RequestBuilder {
        let url = format!("{}/chat/completions", self.host.trim_end_matches('/'));
        debug!(url = %url, "posting chat completion");

        let mut builder = self.client.post(&url).bearer_auth(&self.api_key).json(payload);
        if let Some(organization) = &self.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }
        builder
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| extract_error_message(&value))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("An unexpected error occurred")
                    .to_string()
            });
        Err(ProviderError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, ProviderError> {
        let payload = self.payload(&request, false)?;
        let response = self.request(&payload).timeout(self.timeout).send().await?;
        let body: Value = Self::check_status(response).await?.json().await?;
        openai_response_to_message(body)
    }

    async fn stream(&self, request: CompletionRequest<'_>) -> Result<TextStream, ProviderError> {
        let payload = self.payload(&request, true)?;
        // headers only; gaps between chunks are bounded while decoding
        let response = tokio::time::timeout(self.timeout, self.request(&payload).send())
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "no response headers from provider");
                ProviderError::Timeout("no response from provider".to_string())
            })??;
        let response = Self::check_status(response).await?;
        Ok(Box::pin(sse_text_stream(
            Box::pin(response.bytes_stream()),
            self.timeout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ToolCallRequest;
    use crate::models::tool::{Provenance, Tool};
    use crate::providers::configs::OpenAiCompatibleProviderConfig;
    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let config = ProviderConfig::OpenAiCompatible(OpenAiCompatibleProviderConfig {
            host: format!("{}/v1", server.uri()),
            api_key: "test_api_key".to_string(),
            model_name: None,
        });
        OpenAiProvider::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_complete_basic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-123",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": "Hello! How can I assist you today?",
                        "tool_calls": null
                    },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = vec![Message::user().with_text("Hello?")];
        let message = provider
            .complete(CompletionRequest::new("gpt-3.5-turbo", &messages))
            .await
            .unwrap();

        assert_eq!(message.text(), "Hello! How can I assist you today?");
        assert!(!message.has_tool_calls());
    }

    #[tokio::test]
    async fn test_complete_sends_tools() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "tools": [{"type": "function", "function": {"name": "get_weather"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_123",
                            "type": "function",
                            "function": {
                                "name": "get_weather",
                                "arguments": "{\"location\":\"San Francisco, CA\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = vec![Message::user().with_text("What's the weather in San Francisco?")];
        let tools = vec![Tool::new(
            "get_weather",
            "Gets the current weather for a location",
            json!({
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": ["location"]
            }),
            Provenance::Api("weather".to_string()),
        )];

        let message = provider
            .complete(CompletionRequest::new("gpt-4o", &messages).with_tools(&tools))
            .await
            .unwrap();

        assert_eq!(
            message.tool_calls(),
            &[ToolCallRequest::new(
                "call_123",
                "get_weather",
                "{\"location\":\"San Francisco, CA\"}"
            )]
        );
    }

    #[tokio::test]
    async fn test_complete_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = vec![Message::user().with_text("Hello?")];
        let err = provider
            .complete(CompletionRequest::new("gpt-4o", &messages))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProviderError::Status {
                status: 401,
                message: "Incorrect API key provided".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_complete_connection_refused() {
        let config = ProviderConfig::OpenAiCompatible(OpenAiCompatibleProviderConfig {
            host: "http://127.0.0.1:1/v1".to_string(),
            api_key: "test_api_key".to_string(),
            model_name: None,
        });
        let provider = OpenAiProvider::new(&config, Duration::from_secs(5)).unwrap();
        let messages = vec![Message::user().with_text("Hello?")];

        let err = provider
            .complete(CompletionRequest::new("gpt-4o", &messages))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Connection(_)));
    }

    #[tokio::test]
    async fn test_stream_yields_deltas() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"The answer\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" is 42.\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = vec![Message::user().with_text("What is the answer?")];
        let stream = provider
            .stream(CompletionRequest::new("gpt-4o", &messages))
            .await
            .unwrap();

        let chunks: Vec<String> = stream.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(chunks, vec!["The answer", " is 42."]);
    }

    /// Serve one SSE response whose deltas arrive `gap` apart
    async fn trickle_server(deltas: &'static [&'static str], gap: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // read the whole request before answering
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            for delta in deltas {
                tokio::time::sleep(gap).await;
                let line = format!(
                    "data: {}\n\n",
                    json!({"choices": [{"delta": {"content": delta}}]})
                );
                if socket.write_all(line.as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"data: [DONE]\n\n").await;
            let _ = socket.shutdown().await;
        });

        format!("http://{}/v1", addr)
    }

    fn provider_at(host: String, timeout: Duration) -> OpenAiProvider {
        let config = ProviderConfig::OpenAiCompatible(OpenAiCompatibleProviderConfig {
            host,
            api_key: "test_api_key".to_string(),
            model_name: None,
        });
        OpenAiProvider::new(&config, timeout).unwrap()
    }

    #[tokio::test]
    async fn test_stream_outlives_timeout_while_deltas_arrive() {
        let deltas = &["one ", "two ", "three ", "four"];
        let host = trickle_server(deltas, Duration::from_millis(200)).await;
        let provider = provider_at(host, Duration::from_millis(500));
        let messages = vec![Message::user().with_text("Count to four")];

        let stream = provider
            .stream(CompletionRequest::new("deepseek-r1-0528", &messages))
            .await
            .unwrap();
        let chunks: Vec<Result<String, ProviderError>> = stream.collect().await;

        assert!(chunks.iter().all(Result::is_ok), "stream failed: {:?}", chunks);
        let text: String = chunks.into_iter().map(Result::unwrap).collect();
        assert_eq!(text, "one two three four");
    }

    #[tokio::test]
    async fn test_stream_times_out_on_long_silence() {
        let host = trickle_server(&["one ", "two"], Duration::from_millis(600)).await;
        let provider = provider_at(host, Duration::from_millis(200));
        let messages = vec![Message::user().with_text("Count to two")];

        let stream = provider
            .stream(CompletionRequest::new("gpt-4o", &messages))
            .await
            .unwrap();
        let chunks: Vec<Result<String, ProviderError>> = stream.collect().await;

        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], Err(ProviderError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "choices": [{"message": {"role": "assistant", "content": "late"}}]
                    }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let provider = provider_at(format!("{}/v1", server.uri()), Duration::from_millis(100));
        let messages = vec![Message::user().with_text("Hello?")];
        let err = provider
            .complete(CompletionRequest::new("gpt-4o", &messages))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }
}
