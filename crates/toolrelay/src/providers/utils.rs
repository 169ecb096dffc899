use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::base::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Convert the conversation to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Result<Vec<Value>, ProviderError> {
    messages
        .iter()
        .map(|message| {
            serde_json::to_value(message)
                .map_err(|e| ProviderError::InvalidResponse(format!("unserializable message: {}", e)))
        })
        .collect()
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> Result<Message, ProviderError> {
    if let Some(error) = response.get("error") {
        let message = extract_error_message(&json!({ "error": error }))
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::Status {
            status: 500,
            message,
        });
    }

    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .cloned()
        .ok_or_else(|| ProviderError::InvalidResponse("no choices in completion".to_string()))?;

    serde_json::from_value(original)
        .map_err(|e| ProviderError::InvalidResponse(format!("malformed message: {}", e)))
}

/// Pull a human readable message out of an error body.
///
/// Looks at `error.message`, then `message`, then `detail`.
pub fn extract_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str))
        .or_else(|| body.get("detail").and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// Whether a string is an absolute http or https URL
pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.scheme() == "http" || parsed.scheme() == "https",
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

/// Interpret one line of a streamed chat completion
pub fn parse_sse_line(line: &str) -> Result<Option<SseEvent>, ProviderError> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        // blank keep-alives, comments and event/id fields
        return Ok(None);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad stream chunk: {}", e)))?;
    if chunk.get("error").is_some() {
        let message = extract_error_message(&chunk).unwrap_or_else(|| chunk["error"].to_string());
        return Err(ProviderError::Status {
            status: 500,
            message,
        });
    }

    Ok(chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|text| !text.is_empty())
        .map(|text| SseEvent::Delta(text.to_string())))
}

/// Decode a server-sent event body into the text deltas it carries.
///
/// Lines may be split across chunks; decoding stops at `[DONE]`. Waiting
/// longer than `idle` for the next chunk fails the stream with a timeout.
pub fn sse_text_stream<S, B, E>(
    mut chunks: S,
    idle: Duration,
) -> impl Stream<Item = Result<String, ProviderError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ProviderError> + Send + 'static,
{
    async_stream::try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        while !done {
            let next = tokio::time::timeout(idle, chunks.next())
                .await
                .map_err(|_| ProviderError::Timeout(format!("no stream data for {:?}", idle)))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(Into::<ProviderError>::into)?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line))? {
                    Some(SseEvent::Delta(text)) => yield text,
                    Some(SseEvent::Done) => {
                        done = true;
                        break;
                    }
                    None => {}
                }
            }
        }

        // a final line without its newline
        if !done && !buffer.is_empty() {
            if let Some(SseEvent::Delta(text)) = parse_sse_line(&String::from_utf8_lossy(&buffer))? {
                yield text;
            }
        }
    }
}
