use serde::{Deserialize, Serialize};

use super::role::Role;

/// The function half of a tool call, with arguments still as raw text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A model-issued request to invoke a named function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCallRequest {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM, in the chat completions wire format
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn with_role(role: Role) -> Self {
        Message {
            role,
            content: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system() -> Self {
        Self::with_role(Role::System)
    }

    pub fn user() -> Self {
        Self::with_role(Role::User)
    }

    pub fn assistant() -> Self {
        Self::with_role(Role::Assistant)
    }

    /// Create the result message for a tool call
    pub fn tool_result<I, N, C>(tool_call_id: I, name: N, content: C) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        C: Into<String>,
    {
        Message {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }

    /// Set the text content of the message
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = Some(text.into());
        self
    }

    /// Add a tool call request to the message
    pub fn with_tool_call(mut self, call: ToolCallRequest) -> Self {
        self.tool_calls.get_or_insert_with(Vec::new).push(call);
        self
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Tool calls requested by this message, empty if there are none
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}
