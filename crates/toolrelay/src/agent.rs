use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;
use tracing::{debug, error, info};

use crate::dispatcher::Dispatcher;
use crate::errors::{TurnError, TurnResult};
use crate::models::message::{Message, ToolCallRequest};
use crate::providers::base::{CompletionRequest, Provider, TextStream};
use crate::providers::configs::Profile;
use crate::providers::factory::{get_provider, ProviderKind};
use crate::registry::Registry;
use crate::schema::ToolSchema;
use crate::search::TavilyClient;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub enable_web_search: bool,
}

/// One chat turn as sent by the interface
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub chat_settings: ChatSettings,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub selected_tools: Vec<ToolSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TurnPhase {
    AwaitingFirstCompletion,
    DispatchingTools,
    AwaitingFinalCompletion,
    Done,
}

pub enum TurnReply {
    /// The model answered without calling any tool
    Complete(String),
    /// Final answer after one round of tool calls
    Stream(TextStream),
}

/// Agent drives one turn: offer tools, run the calls, ask for the final answer
pub struct Agent {
    provider: Arc<dyn Provider>,
    kind: ProviderKind,
    model: String,
    dispatcher: Dispatcher,
    search: Option<TavilyClient>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        kind: ProviderKind,
        model: impl Into<String>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            provider,
            kind,
            model: model.into(),
            dispatcher,
            search: None,
        }
    }

    /// Offer `web_search` through this client when a turn enables it
    pub fn with_search(mut self, search: Option<TavilyClient>) -> Self {
        self.search = search;
        self
    }

    /// Build an agent from the profile credentials for a provider kind.
    ///
    /// Fails before any network call when the profile lacks what the
    /// provider needs.
    pub fn from_profile(
        profile: &Profile,
        kind: ProviderKind,
        requested_model: &str,
        provider_timeout: Duration,
        dispatcher: Dispatcher,
    ) -> TurnResult<Self> {
        let config = profile.provider_config(kind)?;
        let provider: Arc<dyn Provider + Send + Sync> =
            get_provider(&config, provider_timeout)
                .map_err(|e| TurnError::provider(kind, e))?
                .into();
        let model = config.model_for(requested_model);
        debug!(provider = %kind, model = %model, "resolved provider");
        Ok(Self::new(provider, kind, model, dispatcher))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn reply(&self, request: TurnRequest) -> TurnResult<TurnReply> {
        let TurnRequest {
            chat_settings: settings,
            mut messages,
            selected_tools,
        } = request;

        let registry = Registry::build(
            self.search.clone(),
            settings.enable_web_search,
            &selected_tools,
        );

        debug!(
            phase = %TurnPhase::AwaitingFirstCompletion,
            model = %self.model,
            tools = registry.len(),
            "starting turn"
        );
        let response = self
            .provider
            .complete(
                CompletionRequest::new(&self.model, &messages)
                    .with_tools(registry.tools())
                    .with_temperature(settings.temperature),
            )
            .await
            .map_err(|e| TurnError::provider(self.kind, e))?;

        if !response.has_tool_calls() {
            debug!(phase = %TurnPhase::Done, "answered without tools");
            return Ok(TurnReply::Complete(response.text().to_string()));
        }

        let calls = response.tool_calls().to_vec();
        info!(
            phase = %TurnPhase::DispatchingTools,
            calls = calls.len(),
            "model requested tools"
        );
        messages.push(response);
        self.dispatch_round(&calls, &registry, &mut messages).await?;

        debug!(phase = %TurnPhase::AwaitingFinalCompletion, messages = messages.len());
        let stream = self.stream(&messages, settings.temperature).await?;
        debug!(phase = %TurnPhase::Done, "streaming final answer");
        Ok(TurnReply::Stream(stream))
    }

    /// Run every call in order and append their results.
    ///
    /// A fatal error does not stop the later calls, but nothing more is
    /// appended once one has occurred, and the first one is returned.
    async fn dispatch_round(
        &self,
        calls: &[ToolCallRequest],
        registry: &Registry,
        messages: &mut Vec<Message>,
    ) -> TurnResult<()> {
        let mut fatal: Option<TurnError> = None;
        for call in calls {
            match self.dispatcher.dispatch(call, registry).await {
                Ok(result) if fatal.is_none() => messages.push(result),
                Ok(_) => {}
                Err(e) => {
                    error!(id = %call.id, function = %call.name(), error = %e, "tool call failed");
                    fatal.get_or_insert(e);
                }
            }
        }
        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stream a completion of the conversation without offering tools
    pub async fn stream(
        &self,
        messages: &[Message],
        temperature: Option<f64>,
    ) -> TurnResult<TextStream> {
        self.provider
            .stream(CompletionRequest::new(&self.model, messages).with_temperature(temperature))
            .await
            .map_err(|e| TurnError::provider(self.kind, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use crate::providers::mock::MockProvider;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Duration::from_secs(5)).unwrap()
    }

    fn request(messages: Vec<Message>, selected_tools: Vec<ToolSchema>, web: bool) -> TurnRequest {
        TurnRequest {
            chat_settings: ChatSettings {
                model: "gpt-4o".to_string(),
                temperature: Some(0.5),
                enable_web_search: web,
            },
            messages,
            selected_tools,
        }
    }

    fn items_schema(base_url: &str) -> ToolSchema {
        let doc = json!({
            "openapi": "3.0.0",
            "info": {"title": "Items", "version": "1"},
            "servers": [{"url": base_url}],
            "paths": {
                "/items/{id}": {"get": {"operationId": "getItem"}}
            }
        });
        ToolSchema {
            id: "items".to_string(),
            name: "Items".to_string(),
            schema: doc.to_string(),
            custom_headers: None,
        }
    }

    async fn collect(reply: TurnReply) -> String {
        match reply {
            TurnReply::Complete(text) => text,
            TurnReply::Stream(stream) => stream
                .map(|chunk| chunk.unwrap())
                .collect::<Vec<_>>()
                .await
                .concat(),
        }
    }

    #[tokio::test]
    async fn test_answer_without_tools() {
        let provider = Arc::new(MockProvider::new(
            vec![Message::assistant().with_text("Just text")],
            vec!["unused"],
        ));
        let agent = Agent::new(provider.clone(), ProviderKind::OpenAi, "gpt-4o", dispatcher());

        let reply = agent
            .reply(request(vec![Message::user().with_text("Hi")], vec![], false))
            .await
            .unwrap();

        assert!(matches!(reply, TurnReply::Complete(ref text) if text == "Just text"));
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].streamed);
        assert!(calls[0].tool_names.is_empty());
    }

    #[tokio::test]
    async fn test_null_content_is_empty_text() {
        let provider = Arc::new(MockProvider::new(vec![Message::assistant()], vec![]));
        let agent = Agent::new(provider, ProviderKind::OpenAi, "gpt-4o", dispatcher());

        let reply = agent
            .reply(request(vec![Message::user().with_text("Hi")], vec![], false))
            .await
            .unwrap();
        assert_eq!(collect(reply).await, "");
    }

    #[tokio::test]
    async fn test_tool_round_then_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "widget"})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Arc::new(MockProvider::new(
            vec![Message::assistant().with_tool_call(ToolCallRequest::new(
                "call_1",
                "getItem",
                r#"{"parameters": {"id": "42"}}"#,
            ))],
            vec!["It is ", "a widget."],
        ));
        let agent = Agent::new(provider.clone(), ProviderKind::OpenAi, "gpt-4o", dispatcher());

        let reply = agent
            .reply(request(
                vec![Message::user().with_text("What is item 42?")],
                vec![items_schema(&server.uri())],
                false,
            ))
            .await
            .unwrap();
        assert_eq!(collect(reply).await, "It is a widget.");

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_names, vec!["getItem"]);
        assert!(calls[1].streamed);
        assert!(calls[1].tool_names.is_empty());

        let history = &calls[1].messages;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[2].role, Role::Tool);
        assert_eq!(history[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(history[2].text(), r#"{"name":"widget"}"#);
    }

    #[tokio::test]
    async fn test_search_failure_still_reaches_final_round() {
        let search =
            TavilyClient::new("tvly", "http://127.0.0.1:1/search", Duration::from_secs(5)).unwrap();
        let provider = Arc::new(MockProvider::new(
            vec![Message::assistant().with_tool_call(ToolCallRequest::new(
                "call_1",
                "web_search",
                r#"{"query": "weather"}"#,
            ))],
            vec!["From memory: sunny."],
        ));
        let agent = Agent::new(provider.clone(), ProviderKind::OpenAi, "gpt-4o", dispatcher())
            .with_search(Some(search));

        let reply = agent
            .reply(request(vec![Message::user().with_text("Weather?")], vec![], true))
            .await
            .unwrap();
        assert_eq!(collect(reply).await, "From memory: sunny.");

        let calls = provider.calls();
        assert_eq!(calls[0].tool_names, vec!["web_search"]);
        let tool_message: serde_json::Value =
            serde_json::from_str(calls[1].messages[2].text()).unwrap();
        assert_eq!(tool_message["errorType"], "connection");
        assert_eq!(tool_message["results"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_function_aborts_after_siblings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(2)
            .mount(&server)
            .await;

        let provider = Arc::new(MockProvider::new(vec![], vec![]));
        let agent = Agent::new(provider.clone(), ProviderKind::OpenAi, "gpt-4o", dispatcher());
        let registry = Registry::build(None, false, &[items_schema(&server.uri())]);
        let calls = vec![
            ToolCallRequest::new("call_1", "getItem", r#"{"parameters": {"id": "1"}}"#),
            ToolCallRequest::new("call_2", "missingFn", "{}"),
            ToolCallRequest::new("call_3", "getItem", r#"{"parameters": {"id": "1"}}"#),
        ];

        let mut messages = Vec::new();
        let err = agent
            .dispatch_round(&calls, &registry, &mut messages)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Function missingFn not found in any schema");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_fatal_error_skips_final_round() {
        let provider = Arc::new(MockProvider::new(
            vec![Message::assistant()
                .with_tool_call(ToolCallRequest::new("call_1", "missingFn", "{}"))],
            vec!["never"],
        ));
        let agent = Agent::new(provider.clone(), ProviderKind::OpenAi, "gpt-4o", dispatcher());

        let result = agent
            .reply(request(vec![Message::user().with_text("Go")], vec![], false))
            .await;

        assert!(matches!(result, Err(TurnError::FunctionNotFound(_))));
        assert_eq!(provider.calls().len(), 1);
    }

    #[test]
    fn test_from_profile_requires_credentials() {
        let err = Agent::from_profile(
            &Profile::default(),
            ProviderKind::OpenAiCompatible,
            "openai-compatible",
            Duration::from_secs(5),
            dispatcher(),
        )
        .err()
        .unwrap();
        assert_eq!(err.status_code(), 401);
        assert_eq!(
            err.user_message(),
            "OpenAI Compatible API Key not found. Please set it in your profile settings."
        );
    }

    #[test]
    fn test_from_profile_resolves_model_name() {
        let profile = Profile {
            openai_compatible_api_key: Some("sk".to_string()),
            openai_compatible_base_url: Some("http://localhost:8080/v1".to_string()),
            openai_compatible_model_name: Some("qwen2.5".to_string()),
            ..Default::default()
        };
        let agent = Agent::from_profile(
            &profile,
            ProviderKind::OpenAiCompatible,
            "openai-compatible",
            Duration::from_secs(5),
            dispatcher(),
        )
        .unwrap();
        assert_eq!(agent.model(), "qwen2.5");
    }

    #[test]
    fn test_turn_request_wire_format() {
        let request: TurnRequest = serde_json::from_value(json!({
            "chatSettings": {"model": "gpt-4o", "temperature": 0.2, "enableWebSearch": true},
            "messages": [{"role": "user", "content": "hello"}],
            "selectedTools": [{"id": "s1", "name": "Items", "schema": "{}", "custom_headers": "{}"}]
        }))
        .unwrap();

        assert!(request.chat_settings.enable_web_search);
        assert_eq!(request.chat_settings.temperature, Some(0.2));
        assert_eq!(request.messages[0].text(), "hello");
        assert_eq!(request.selected_tools[0].id, "s1");
    }
}
