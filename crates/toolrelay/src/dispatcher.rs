use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::errors::{TurnError, TurnResult};
use crate::models::message::{Message, ToolCallRequest};
use crate::registry::Registry;
use crate::schema::ApiSchema;
use crate::search::{
    format_search_results, SearchArguments, SearchError, TavilyClient, WEB_SEARCH_TOOL_NAME,
};

lazy_static! {
    static ref PATH_PARAM: Regex = Regex::new(r":(\w+)").unwrap();
}

const SEARCH_UNAVAILABLE_NOTE: &str =
    "Search was unavailable. Please respond based on your existing knowledge.";

/// Executes the tool calls of one turn
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Run one tool call and wrap its outcome in a `tool` message.
    ///
    /// Only an unknown function or a missing path parameter is returned as an
    /// error; every other failure is reported to the model in the content.
    pub async fn dispatch(
        &self,
        call: &ToolCallRequest,
        registry: &Registry,
    ) -> TurnResult<Message> {
        let name = call.name();
        debug!(id = %call.id, function = %name, "dispatching tool call");

        let arguments: Value = match serde_json::from_str(call.function.arguments.trim()) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(function = %name, error = %e, "unparseable tool arguments");
                return Ok(tool_message(call, invalid_arguments(name, &e.to_string())));
            }
        };

        if name == WEB_SEARCH_TOOL_NAME {
            if let Some(search) = registry.search() {
                let content = run_search(search, name, arguments).await;
                return Ok(tool_message(call, content));
            }
        }

        let Some((api, template)) = registry.resolve_route(name) else {
            error!(function = %name, "no schema serves this function");
            return Err(TurnError::FunctionNotFound(name.to_string()));
        };

        let path = fill_path(template, &arguments["parameters"], name)?;
        let content = self.call_api(api, &path, &arguments).await;
        Ok(tool_message(call, content))
    }

    async fn call_api(&self, api: &ApiSchema, path: &str, arguments: &Value) -> Value {
        let mut url = format!("{}{}", api.base_url, path);

        let mut request = if api.request_in_body {
            let body = match arguments.get("requestBody") {
                Some(body) if !body.is_null() => body,
                _ => arguments,
            };
            self.client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(body)
        } else {
            let query = query_string(&arguments["parameters"]);
            if !query.is_empty() {
                url = format!("{}?{}", url, query);
            }
            self.client.get(&url)
        };
        for (name, value) in &api.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!(url = %url, in_body = api.request_in_body, "calling api");
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "tool request failed");
                return json!({ "error": e.to_string() });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Request failed");
            return json!({ "error": reason });
        }

        match response.json::<Value>().await {
            Ok(body) => body,
            Err(e) => json!({ "error": format!("Response was not valid JSON: {}", e) }),
        }
    }
}

async fn run_search(search: &TavilyClient, name: &str, arguments: Value) -> Value {
    let arguments: SearchArguments = match serde_json::from_value(arguments) {
        Ok(arguments) => arguments,
        Err(e) => return invalid_arguments(name, &e.to_string()),
    };

    match search.search(&arguments.query).await {
        Ok(results) => {
            let response = format_search_results(&results);
            json!({ "results": response.results, "sources": response.sources })
        }
        Err(e) => {
            warn!(error = %e, error_type = e.error_type(), "web search degraded");
            search_failure(&e)
        }
    }
}

fn search_failure(err: &SearchError) -> Value {
    json!({
        "error": err.to_string(),
        "errorType": err.error_type(),
        "results": [],
        "sources": "",
        "note": SEARCH_UNAVAILABLE_NOTE,
    })
}

fn invalid_arguments(function: &str, reason: &str) -> Value {
    json!({
        "error": format!("Invalid arguments for {}: {}", function, reason),
        "errorType": "invalid_arguments",
    })
}

fn tool_message(call: &ToolCallRequest, content: Value) -> Message {
    Message::tool_result(&call.id, call.name(), content.to_string())
}

fn param_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Substitute `:name` placeholders with percent-encoded parameter values.
///
/// Null, `""`, `0` and `false` all count as a missing value.
fn fill_path(template: &str, parameters: &Value, function: &str) -> TurnResult<String> {
    let mut path = String::with_capacity(template.len());
    let mut last = 0;
    for placeholder in PATH_PARAM.find_iter(template) {
        let key = &placeholder.as_str()[1..];
        let value = parameters
            .get(key)
            .and_then(param_text)
            .ok_or_else(|| {
                error!(function = %function, parameter = %key, "missing path parameter");
                TurnError::MissingPathParameter {
                    function: function.to_string(),
                    parameter: key.to_string(),
                }
            })?;
        path.push_str(&template[last..placeholder.start()]);
        path.push_str(&urlencoding::encode(&value));
        last = placeholder.end();
    }
    path.push_str(&template[last..]);
    Ok(path)
}

fn query_string(parameters: &Value) -> String {
    let Some(parameters) = parameters.as_object() else {
        return String::new();
    };
    let pairs: Vec<(&str, String)> = parameters
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (key.as_str(), text)
        })
        .collect();
    serde_urlencoded::to_string(pairs).unwrap_or_default()
}
