use crate::error::ApiError;
use crate::routes::stream::TextStreamResponse;
use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use toolrelay::{
    agent::{Agent, TurnReply, TurnRequest},
    providers::factory::ProviderKind,
};

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> Result<Response, ApiError> {
    let model = request.chat_settings.model.clone();
    let kind = ProviderKind::from_model(&model);
    tracing::info!(model = %model, provider = %kind, tools = request.selected_tools.len(), "tool turn");

    let agent = Agent::from_profile(
        &state.profile,
        kind,
        &model,
        state.provider_timeout,
        state.dispatcher.clone(),
    )?
    .with_search(state.search.clone());

    match agent.reply(request).await? {
        TurnReply::Complete(text) => {
            Ok(([(header::CONTENT_TYPE, "application/json")], text).into_response())
        }
        TurnReply::Stream(stream) => Ok(TextStreamResponse::spawn(stream).into_response()),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/tools", post(handler))
        .with_state(state)
}
