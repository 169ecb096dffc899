use crate::error::ApiError;
use crate::routes::stream::TextStreamResponse;
use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use toolrelay::{
    agent::{Agent, ChatSettings},
    errors::TurnError,
    models::message::Message,
    providers::factory::ProviderKind,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    chat_settings: ChatSettings,
    messages: Vec<Message>,
}

// Plain streamed chat through the OpenAI-compatible profile, no tools
async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<TextStreamResponse, ApiError> {
    let kind = ProviderKind::OpenAiCompatible;
    let agent = Agent::from_profile(
        &state.profile,
        kind,
        &request.chat_settings.model,
        state.provider_timeout,
        state.dispatcher.clone(),
    )?;
    let model = state
        .profile
        .provider_config(kind)
        .map_err(TurnError::from)?
        .chat_model_for(&request.chat_settings.model);
    let agent = agent.with_model(model);

    let stream = agent
        .stream(&request.messages, request.chat_settings.temperature)
        .await?;
    Ok(TextStreamResponse::spawn(stream))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/openai-compatible", post(handler))
        .with_state(state)
}
