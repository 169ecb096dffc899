use axum::{routing::get, Json, Router};
use toolrelay::models::catalog::{openai_compatible_models, LlmModel};

async fn list_compatible() -> Json<Vec<LlmModel>> {
    Json(openai_compatible_models())
}

async fn health() -> &'static str {
    "ok"
}

pub fn routes() -> Router {
    Router::new()
        .route("/api/models/openai-compatible", get(list_compatible))
        .route("/health", get(health))
}
