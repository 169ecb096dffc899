use serde::Deserialize;

use super::factory::{ProviderKind, OPENAI_COMPATIBLE_MODEL_ID};
use super::utils::is_valid_url;
use crate::errors::ConfigurationError;

pub const OPENAI_HOST: &str = "https://api.openai.com/v1";
pub const GROQ_HOST: &str = "https://api.groq.com/openai/v1";
pub const MISTRAL_HOST: &str = "https://api.mistral.ai/v1";

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Groq(GroqProviderConfig),
    Mistral(MistralProviderConfig),
    OpenAiCompatible(OpenAiCompatibleProviderConfig),
}

// Define specific config structs for each provider
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroqProviderConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MistralProviderConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiCompatibleProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model_name: Option<String>,
}

impl ProviderConfig {
    /// The provider whose credentials this config carries
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::OpenAi(_) => ProviderKind::OpenAi,
            ProviderConfig::Groq(_) => ProviderKind::Groq,
            ProviderConfig::Mistral(_) => ProviderKind::Mistral,
            ProviderConfig::OpenAiCompatible(_) => ProviderKind::OpenAiCompatible,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(config) => &config.host,
            ProviderConfig::Groq(_) => GROQ_HOST,
            ProviderConfig::Mistral(_) => MISTRAL_HOST,
            ProviderConfig::OpenAiCompatible(config) => &config.host,
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(config) => &config.api_key,
            ProviderConfig::Groq(config) => &config.api_key,
            ProviderConfig::Mistral(config) => &config.api_key,
            ProviderConfig::OpenAiCompatible(config) => &config.api_key,
        }
    }

    pub fn organization(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAi(config) => config.organization.as_deref(),
            _ => None,
        }
    }

    /// Model name to send, given the model id picked in the interface
    pub fn model_for(&self, requested: &str) -> String {
        match self {
            ProviderConfig::OpenAiCompatible(config) => config
                .model_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .or(Some(requested).filter(|id| {
                    !id.trim().is_empty() && !id.starts_with(OPENAI_COMPATIBLE_MODEL_ID)
                }))
                .unwrap_or("default")
                .to_string(),
            _ => requested.to_string(),
        }
    }

    /// Model name for a plain chat, where the requested id is sent as is
    /// unless the profile names a model
    pub fn chat_model_for(&self, requested: &str) -> String {
        match self {
            ProviderConfig::OpenAiCompatible(config) => config
                .model_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .or(Some(requested).filter(|id| !id.trim().is_empty()))
                .unwrap_or("default")
                .to_string(),
            _ => requested.to_string(),
        }
    }
}

/// Per-user provider credentials and endpoints
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_organization_id: Option<String>,
    #[serde(default)]
    pub openai_host: Option<String>,
    #[serde(default)]
    pub openai_compatible_api_key: Option<String>,
    #[serde(default)]
    pub openai_compatible_base_url: Option<String>,
    #[serde(default)]
    pub openai_compatible_model_name: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub mistral_api_key: Option<String>,
    #[serde(default)]
    pub tavily_api_key: Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Profile {
    /// Resolve the credentials a provider kind needs.
    ///
    /// Anthropic, Google and unrecognised models go through the OpenAI credentials.
    pub fn provider_config(&self, kind: ProviderKind) -> Result<ProviderConfig, ConfigurationError> {
        match kind {
            ProviderKind::OpenAiCompatible => {
                let api_key = present(&self.openai_compatible_api_key)
                    .ok_or(ConfigurationError::ApiKeyNotFound(kind))?;
                let host = present(&self.openai_compatible_base_url)
                    .ok_or(ConfigurationError::BaseUrlNotConfigured(kind))?;
                if !is_valid_url(&host) {
                    return Err(ConfigurationError::InvalidBaseUrl {
                        provider: kind,
                        url: host,
                    });
                }
                Ok(ProviderConfig::OpenAiCompatible(
                    OpenAiCompatibleProviderConfig {
                        host,
                        api_key,
                        model_name: present(&self.openai_compatible_model_name),
                    },
                ))
            }
            ProviderKind::Groq => Ok(ProviderConfig::Groq(GroqProviderConfig {
                api_key: present(&self.groq_api_key)
                    .ok_or(ConfigurationError::ApiKeyNotFound(kind))?,
            })),
            ProviderKind::Mistral => Ok(ProviderConfig::Mistral(MistralProviderConfig {
                api_key: present(&self.mistral_api_key)
                    .ok_or(ConfigurationError::ApiKeyNotFound(kind))?,
            })),
            ProviderKind::OpenAi
            | ProviderKind::Anthropic
            | ProviderKind::Google
            | ProviderKind::Unknown => {
                let api_key = present(&self.openai_api_key)
                    .ok_or(ConfigurationError::ApiKeyNotFound(ProviderKind::OpenAi))?;
                let host = present(&self.openai_host).unwrap_or_else(|| OPENAI_HOST.to_string());
                if !is_valid_url(&host) {
                    return Err(ConfigurationError::InvalidBaseUrl {
                        provider: ProviderKind::OpenAi,
                        url: host,
                    });
                }
                Ok(ProviderConfig::OpenAi(OpenAiProviderConfig {
                    host,
                    api_key,
                    organization: present(&self.openai_organization_id),
                }))
            }
        }
    }

    /// The search key, if one is configured and not blank
    pub fn tavily_api_key(&self) -> Option<String> {
        present(&self.tavily_api_key)
    }
}
