use thiserror::Error;

use crate::providers::base::ProviderError;
use crate::providers::factory::ProviderKind;

/// Missing or malformed provider credentials, detected before any request is sent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{0} API Key not found")]
    ApiKeyNotFound(ProviderKind),

    #[error("{0} base URL not configured")]
    BaseUrlNotConfigured(ProviderKind),

    #[error("{provider} base URL is not a valid http(s) URL: {url}")]
    InvalidBaseUrl { provider: ProviderKind, url: String },
}

/// Errors that abort a whole turn.
///
/// Everything recoverable about a single tool call is folded into that call's
/// tool message instead, so the conversation can go on.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{source}")]
    Provider {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },

    #[error("Function {0} not found in any schema")]
    FunctionNotFound(String),

    #[error("Parameter {parameter} not found for function {function}")]
    MissingPathParameter { function: String, parameter: String },
}

impl TurnError {
    pub fn provider(provider: ProviderKind, source: ProviderError) -> Self {
        TurnError::Provider { provider, source }
    }

    /// HTTP-style status code for the caller
    pub fn status_code(&self) -> u16 {
        match self {
            TurnError::Configuration(ConfigurationError::ApiKeyNotFound(_)) => 401,
            TurnError::Configuration(_) => 400,
            TurnError::Provider { source, .. } => match source {
                ProviderError::Status { status, .. } => *status,
                _ => 500,
            },
            TurnError::FunctionNotFound(_) | TurnError::MissingPathParameter { .. } => 500,
        }
    }

    /// Stable, user-facing rewrite of the error
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Configuration(ConfigurationError::ApiKeyNotFound(provider)) => format!(
                "{} API Key not found. Please set it in your profile settings.",
                provider
            ),
            TurnError::Configuration(ConfigurationError::BaseUrlNotConfigured(provider)) => {
                format!(
                    "{} base URL not configured. Please set it in your profile settings.",
                    provider
                )
            }
            TurnError::Configuration(err) => err.to_string(),
            TurnError::Provider { provider, source } => match source {
                ProviderError::Connection(_) => "Unable to connect to the endpoint. Please verify the URL is correct and the service is running.".to_string(),
                ProviderError::Timeout(_) => {
                    "Connection timeout. Please check if the endpoint is accessible.".to_string()
                }
                ProviderError::Status { status: 401, .. } => format!(
                    "Invalid API key. Please check your {} API key in profile settings.",
                    provider
                ),
                ProviderError::Status { status: 403, .. } => {
                    "Access denied. Please verify your API key has the required permissions."
                        .to_string()
                }
                ProviderError::Status { message, .. } => message.clone(),
                ProviderError::InvalidResponse(_) => "An unexpected error occurred".to_string(),
            },
            TurnError::FunctionNotFound(_) | TurnError::MissingPathParameter { .. } => {
                self.to_string()
            }
        }
    }
}

pub type TurnResult<T> = Result<T, TurnError>;
