use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::openapi::openapi_to_functions;
use super::{SchemaError, ToolSchema};
use crate::models::tool::{Provenance, Tool};

lazy_static! {
    static ref PATH_PLACEHOLDER: Regex = Regex::new(r"\{(\w+)\}").unwrap();
}

/// Everything needed to call the functions of one external API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSchema {
    pub schema_id: String,
    pub title: String,
    pub description: String,
    pub base_url: String,
    pub headers: Vec<(String, String)>,
    /// Canonical path template (`/items/:id`) to operation id
    pub routes: Vec<(String, String)>,
    pub request_in_body: bool,
    pub functions: Vec<Tool>,
}

impl ApiSchema {
    /// Path template whose operation id is `function`
    pub fn path_for(&self, function: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|(_, operation_id)| operation_id == function)
            .map(|(path, _)| path.as_str())
    }
}

/// Rewrite `{param}` placeholders to `:param`
pub fn canonical_path(path: &str) -> String {
    PATH_PLACEHOLDER.replace_all(path, ":$1").into_owned()
}

fn parse_headers(raw: Option<&Value>) -> Result<Vec<(String, String)>, SchemaError> {
    let parsed;
    let value = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(text)) => {
            parsed = serde_json::from_str::<Value>(text)
                .map_err(|e| SchemaError::CustomHeaders(e.to_string()))?;
            &parsed
        }
        Some(other) => other,
    };

    let object = value
        .as_object()
        .ok_or_else(|| SchemaError::CustomHeaders(value.to_string()))?;
    object
        .iter()
        .map(|(name, value)| match value {
            Value::String(value) => Ok((name.clone(), value.clone())),
            other => Err(SchemaError::CustomHeaders(format!("{}: {}", name, other))),
        })
        .collect()
}

/// Parse, validate and convert one stored schema
pub fn resolve(schema: &ToolSchema) -> Result<ApiSchema, SchemaError> {
    let doc: Value =
        serde_json::from_str(&schema.schema).map_err(|e| SchemaError::Parse(e.to_string()))?;
    let converted = openapi_to_functions(&doc)?;
    if converted.routes.is_empty() {
        return Err(SchemaError::NoOperations);
    }

    let headers = parse_headers(schema.custom_headers.as_ref())?;

    let mut routes: Vec<(String, String)> = Vec::new();
    for route in &converted.routes {
        let path = canonical_path(&route.path);
        match routes.iter_mut().find(|(existing, _)| *existing == path) {
            Some(entry) => entry.1 = route.operation_id.clone(),
            None => routes.push((path, route.operation_id.clone())),
        }
    }

    let functions = converted
        .functions
        .into_iter()
        .map(|function| {
            Tool::new(
                function.name,
                function.description,
                function.parameters,
                Provenance::Api(schema.id.clone()),
            )
        })
        .collect::<Vec<_>>();

    debug!(
        schema = %schema.id,
        functions = functions.len(),
        routes = routes.len(),
        "resolved tool schema"
    );

    Ok(ApiSchema {
        schema_id: schema.id.clone(),
        title: converted.info.title,
        description: converted.info.description,
        base_url: converted.info.server,
        headers,
        request_in_body: converted.routes[0].request_in_body,
        routes,
        functions,
    })
}
