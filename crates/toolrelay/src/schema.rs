//! Turning user-supplied OpenAPI documents into callable functions
//!
//! `openapi` does the pure document conversion, `resolver` adds the
//! per-schema metadata the dispatcher needs to build HTTP requests.
pub mod openapi;
pub mod resolver;

use serde::Deserialize;
use thiserror::Error;

pub use openapi::{openapi_to_functions, ApiInfo, ConvertedSchema, FunctionSpec, Route};
pub use resolver::{resolve, ApiSchema};

/// A stored OpenAPI schema the user selected for this turn
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolSchema {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// The OpenAPI document as text
    pub schema: String,
    /// Header map as serialized JSON, or already an object
    #[serde(default)]
    pub custom_headers: Option<serde_json::Value>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Parse(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Some methods are missing operationId ({method} {path})")]
    MissingOperationId { path: String, method: String },

    #[error("schema declares no operations")]
    NoOperations,

    #[error("custom headers must be a JSON object of strings: {0}")]
    CustomHeaders(String),
}

impl SchemaError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SchemaError::Invalid(message.into())
    }
}
