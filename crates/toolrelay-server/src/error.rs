use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use toolrelay::errors::TurnError;
use tracing::error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted settings key
pub fn to_env_var(field: &str) -> String {
    format!("TOOLRELAY_{}", field.replace('.', "__").to_uppercase())
}

/// A failed turn, rendered as `{message}` with the matching status
#[derive(Debug)]
pub struct ApiError(pub TurnError);

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error!(status = %status, error = %self.0, "turn failed");
        (status, Json(json!({ "message": self.0.user_message() }))).into_response()
    }
}
