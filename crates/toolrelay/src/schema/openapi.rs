use serde_json::{json, Map, Value};

use super::SchemaError;

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

// $ref chains deeper than this are left unresolved
const MAX_REF_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiInfo {
    pub title: String,
    pub description: String,
    pub server: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub path: String,
    pub method: String,
    pub operation_id: String,
    pub request_in_body: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The function list, route list and metadata derived from one document
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedSchema {
    pub info: ApiInfo,
    pub routes: Vec<Route>,
    pub functions: Vec<FunctionSpec>,
}

/// Iterate the operations of a path item in declaration order
fn operations(path_item: &Value) -> impl Iterator<Item = (&str, &Value)> {
    path_item
        .as_object()
        .into_iter()
        .flat_map(|item| item.iter())
        .filter(|(method, _)| HTTP_METHODS.contains(&method.to_ascii_lowercase().as_str()))
        .map(|(method, operation)| (method.as_str(), operation))
}

/// Check the parts of the document the conversion relies on
pub fn validate_openapi(doc: &Value) -> Result<(), SchemaError> {
    let version = doc.get("openapi").and_then(Value::as_str).unwrap_or_default();
    if !version.starts_with("3.") {
        return Err(SchemaError::invalid("only OpenAPI 3.x documents are supported"));
    }

    let info = doc
        .get("info")
        .ok_or_else(|| SchemaError::invalid("('info'): field required"))?;
    if info.get("title").and_then(Value::as_str).unwrap_or_default().is_empty() {
        return Err(SchemaError::invalid("('info', 'title'): field required"));
    }
    if info.get("version").and_then(Value::as_str).unwrap_or_default().is_empty() {
        return Err(SchemaError::invalid("('info', 'version'): field required"));
    }

    let servers = doc
        .get("servers")
        .and_then(Value::as_array)
        .filter(|servers| !servers.is_empty())
        .ok_or_else(|| SchemaError::invalid("Could not find a valid URL in `servers`"))?;
    if servers.len() > 1 {
        return Err(SchemaError::invalid("Found multiple URLs in `servers`"));
    }
    if servers[0].get("url").and_then(Value::as_str).unwrap_or_default().is_empty() {
        return Err(SchemaError::invalid("Could not find a valid URL in `servers`"));
    }

    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .filter(|paths| !paths.is_empty())
        .ok_or_else(|| SchemaError::invalid("No paths found in the OpenAPI spec"))?;

    for (path, item) in paths {
        if !path.starts_with('/') {
            return Err(SchemaError::invalid(format!(
                "Path {} does not start with a slash",
                path
            )));
        }
        for (method, operation) in operations(item) {
            let operation = resolve_refs(operation, doc, 0);
            if operation
                .get("operationId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .is_empty()
            {
                return Err(SchemaError::MissingOperationId {
                    path: path.clone(),
                    method: method.to_uppercase(),
                });
            }
            if let Some(body) = operation.get("requestBody") {
                if body.pointer("/content/application~1json").is_none() {
                    return Err(SchemaError::invalid(
                        "Some methods with a requestBody are missing requestBody.content['application/json']",
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Inline local `#/...` references
fn resolve_refs(value: &Value, root: &Value, depth: usize) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if depth < MAX_REF_DEPTH {
                    if let Some(target) = reference
                        .strip_prefix('#')
                        .and_then(|pointer| root.pointer(pointer))
                    {
                        return resolve_refs(target, root, depth + 1);
                    }
                }
                return value.clone();
            }
            Value::Object(
                map.iter()
                    .map(|(key, inner)| (key.clone(), resolve_refs(inner, root, depth)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|inner| resolve_refs(inner, root, depth))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn parameters_schema(declared: &[Value]) -> Option<Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in declared {
        let (Some(name), Some(schema)) = (param.get("name").and_then(Value::as_str), param.get("schema"))
        else {
            continue;
        };
        let mut schema = schema.clone();
        if let (Some(description), Some(object)) = (
            param.get("description").and_then(Value::as_str),
            schema.as_object_mut(),
        ) {
            object
                .entry("description")
                .or_insert_with(|| json!(description));
        }
        properties.insert(name.to_string(), schema);
        if param.get("required").and_then(Value::as_bool).unwrap_or(false) {
            required.push(json!(name));
        }
    }

    if properties.is_empty() {
        return None;
    }
    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    Some(schema)
}

/// Convert a validated OpenAPI 3.x document into callable functions and routes
pub fn openapi_to_functions(doc: &Value) -> Result<ConvertedSchema, SchemaError> {
    validate_openapi(doc)?;

    let info = ApiInfo {
        title: doc["info"]["title"].as_str().unwrap_or_default().to_string(),
        description: doc["info"]["description"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        server: doc["servers"][0]["url"].as_str().unwrap_or_default().to_string(),
    };

    let mut routes = Vec::new();
    let mut functions = Vec::new();

    let paths = doc["paths"].as_object().into_iter().flat_map(|paths| paths.iter());
    for (path, item) in paths {
        let shared_params: Vec<Value> = item
            .get("parameters")
            .and_then(Value::as_array)
            .map(|params| params.iter().map(|p| resolve_refs(p, doc, 0)).collect())
            .unwrap_or_default();

        for (method, operation) in operations(item) {
            let operation = resolve_refs(operation, doc, 0);
            let operation_id = operation["operationId"].as_str().unwrap_or_default().to_string();
            let description = operation
                .get("description")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .or_else(|| operation.get("summary").and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();

            let mut declared = shared_params.clone();
            if let Some(params) = operation.get("parameters").and_then(Value::as_array) {
                declared.extend(params.iter().cloned());
            }

            let mut properties = Map::new();
            let request_body = operation.pointer("/requestBody/content/application~1json/schema");
            if let Some(body) = request_body {
                properties.insert("requestBody".to_string(), body.clone());
            }
            if let Some(params) = parameters_schema(&declared) {
                properties.insert("parameters".to_string(), params);
            }

            functions.push(FunctionSpec {
                name: operation_id.clone(),
                description,
                parameters: json!({ "type": "object", "properties": properties }),
            });
            routes.push(Route {
                path: path.clone(),
                method: method.to_lowercase(),
                operation_id,
                request_in_body: operation.get("requestBody").is_some(),
            });
        }
    }

    Ok(ConvertedSchema {
        info,
        routes,
        functions,
    })
}
