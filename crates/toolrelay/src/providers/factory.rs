use std::time::Duration;

use strum_macros::{Display, EnumIter};

use super::base::{Provider, ProviderError};
use super::configs::ProviderConfig;
use super::openai::OpenAiProvider;

/// Model families we know how to route, resolved once per turn from the model id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ProviderKind {
    #[strum(to_string = "OpenAI")]
    OpenAi,
    Anthropic,
    Google,
    Mistral,
    Groq,
    #[strum(to_string = "OpenAI Compatible")]
    OpenAiCompatible,
    Unknown,
}

pub const OPENAI_COMPATIBLE_MODEL_ID: &str = "openai-compatible";

impl ProviderKind {
    pub fn from_model(model: &str) -> Self {
        if model.starts_with(OPENAI_COMPATIBLE_MODEL_ID) {
            ProviderKind::OpenAiCompatible
        } else if model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3") {
            ProviderKind::OpenAi
        } else if model.starts_with("claude-") {
            ProviderKind::Anthropic
        } else if model.starts_with("gemini-") {
            ProviderKind::Google
        } else if model.starts_with("mistral-") || model.starts_with("mixtral-") {
            ProviderKind::Mistral
        } else if model.starts_with("llama") || model.starts_with("gemma") || model.contains("groq")
        {
            ProviderKind::Groq
        } else {
            ProviderKind::Unknown
        }
    }
}

pub fn get_provider(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<Box<dyn Provider + Send + Sync>, ProviderError> {
    Ok(Box::new(OpenAiProvider::new(config, timeout)?))
}
