use serde::Serialize;

/// A model that can be picked in the interface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmModel {
    pub model_id: &'static str,
    pub model_name: &'static str,
    pub provider: &'static str,
    pub hosted_id: &'static str,
    pub platform_link: &'static str,
    pub image_input: bool,
}

const OPENAI_COMPATIBLE: LlmModel = LlmModel {
    model_id: "openai-compatible",
    model_name: "OpenAI Compatible",
    provider: "openai-compatible",
    hosted_id: "openai-compatible",
    platform_link: "",
    image_input: false,
};

// Hosted on AgentRouter, selectable once a compatible base URL is configured
const DEEPSEEK_R1_0528: LlmModel = LlmModel {
    model_id: "deepseek-r1-0528",
    model_name: "DeepSeek r1 (AgentRouter)",
    provider: "openai-compatible",
    hosted_id: "deepseek-r1-0528",
    platform_link: "https://agentrouter.org/",
    image_input: false,
};

pub fn openai_compatible_models() -> Vec<LlmModel> {
    vec![OPENAI_COMPATIBLE, DEEPSEEK_R1_0528]
}
