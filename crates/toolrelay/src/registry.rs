use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::tool::{Provenance, Tool};
use crate::schema::{resolve, ApiSchema, ToolSchema};
use crate::search::{web_search_tool, TavilyClient};

/// The functions offered to the model for one turn, and where each one goes
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tools: Vec<Tool>,
    provenance: HashMap<String, Provenance>,
    schemas: Vec<ApiSchema>,
    search: Option<TavilyClient>,
}

impl Registry {
    /// Assemble the registry for a turn.
    ///
    /// Search is only offered when a client is configured and the user enabled
    /// it. Schemas that fail to resolve are logged and left out.
    pub fn build(
        search: Option<TavilyClient>,
        enable_web_search: bool,
        schemas: &[ToolSchema],
    ) -> Self {
        let mut registry = Registry::default();

        if enable_web_search {
            if let Some(client) = search {
                registry.insert(web_search_tool());
                registry.search = Some(client);
            }
        }

        schemas.iter().fold(registry, |mut registry, schema| {
            match resolve(schema) {
                Ok(api) => {
                    for function in &api.functions {
                        registry.insert(function.clone());
                    }
                    registry.schemas.push(api);
                }
                Err(e) => {
                    warn!(schema = %schema.id, name = %schema.name, error = %e, "skipping tool schema");
                }
            }
            registry
        })
    }

    fn insert(&mut self, tool: Tool) {
        if self.provenance.contains_key(&tool.name) {
            warn!(function = %tool.name, "duplicate function name, keeping the first registration");
            return;
        }
        debug!(function = %tool.name, "registered function");
        self.provenance
            .insert(tool.name.clone(), tool.provenance.clone());
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn provenance(&self, name: &str) -> Option<&Provenance> {
        self.provenance.get(name)
    }

    /// The search client, present only when `web_search` is registered
    pub fn search(&self) -> Option<&TavilyClient> {
        self.search.as_ref()
    }

    pub fn schemas(&self) -> &[ApiSchema] {
        &self.schemas
    }

    /// Find the API and path template serving a function; first schema wins
    pub fn resolve_route(&self, name: &str) -> Option<(&ApiSchema, &str)> {
        self.schemas
            .iter()
            .find_map(|api| api.path_for(name).map(|path| (api, path)))
    }
}
