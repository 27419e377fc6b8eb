//! Named search tools.
//!
//! Each [`SearchService`] operation is wrapped as a [`Tool`]: a name, a
//! one-line description, a JSON Schema for its parameters, and an async
//! `execute`. The MCP bridge, the HTTP server, and the CLI all dispatch
//! through the same [`ToolRegistry`], so every surface shares one contract:
//!
//! - success → a JSON array of records, in backend order;
//! - failure → an error that renders as `{ "error": "<message>" }`
//!   (see [`error_payload`]).
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ToolRegistry                 │
//! │ search_raw_logs  search_alerts               │
//! │ get_agent_data   search_vulnerabilities      │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!                 SearchService (core)
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use wazuh_search_core::models::{AgentParams, AlertParams, RawLogParams, VulnerabilityParams};
use wazuh_search_core::{Record, SearchError, SearchService};

/// A callable tool exposed to MCP clients, HTTP callers, and the CLI.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use wazuh_search::tools::{Tool, ToolContext};
///
/// pub struct BackendStateTool;
///
/// #[async_trait]
/// impl Tool for BackendStateTool {
///     fn name(&self) -> &str { "backend_state" }
///     fn description(&self) -> &str { "Report the OpenSearch connection state" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
///         Ok(json!({ "state": ctx.service().connection_state() }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores (e.g. `"search_alerts"`).
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema object describing the accepted parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` is always a JSON object.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Everything a tool needs at execution time.
#[derive(Clone)]
pub struct ToolContext {
    service: Arc<SearchService>,
}

impl ToolContext {
    pub fn new(service: Arc<SearchService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &SearchService {
        &self.service
    }
}

/// Deserialize tool parameters, reporting bad shapes as validation errors.
fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, SearchError> {
    let params = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(params)
        .map_err(|e| SearchError::validation(format!("invalid parameters: {}", e)))
}

fn records_to_value(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

/// Render a tool failure as the `{ "error": ... }` object callers expect.
pub fn error_payload(err: &anyhow::Error) -> Value {
    json!({ "error": err.to_string() })
}

/// Whether a tool failure was caused by invalid caller input.
pub fn is_validation_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<SearchError>(),
        Some(SearchError::Validation(_))
    )
}

pub struct SearchRawLogsTool;

#[async_trait]
impl Tool for SearchRawLogsTool {
    fn name(&self) -> &str {
        "search_raw_logs"
    }

    fn description(&self) -> &str {
        "Searches for raw logs in OpenSearch based on a query and time range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "OpenSearch query_string expression" },
                "time_range": { "type": "string", "description": "Relative time window, e.g. 1h, 24h, 7d", "default": "1h" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let params: RawLogParams = parse_params(params)?;
        let records = ctx.service().search_raw_logs(&params).await?;
        Ok(records_to_value(records))
    }
}

pub struct SearchAlertsTool;

#[async_trait]
impl Tool for SearchAlertsTool {
    fn name(&self) -> &str {
        "search_alerts"
    }

    fn description(&self) -> &str {
        "Searches for Wazuh alerts in OpenSearch with a specified minimum severity level."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "OpenSearch query_string expression" },
                "time_range": { "type": "string", "description": "Relative time window, e.g. 1h, 24h, 7d", "default": "1h" },
                "min_level": { "type": "integer", "description": "Minimum rule.level (inclusive)", "default": 0 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let params: AlertParams = parse_params(params)?;
        let records = ctx.service().search_alerts(&params).await?;
        Ok(records_to_value(records))
    }
}

pub struct GetAgentDataTool;

#[async_trait]
impl Tool for GetAgentDataTool {
    fn name(&self) -> &str {
        "get_agent_data"
    }

    fn description(&self) -> &str {
        "Retrieves agent data from OpenSearch. Requires either agent_id or agent_name."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_id": { "type": "string", "description": "Wazuh agent id, e.g. 001 (takes precedence)" },
                "agent_name": { "type": "string", "description": "Wazuh agent name" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let params: AgentParams = parse_params(params)?;
        let records = ctx.service().get_agent_data(&params).await?;
        Ok(records_to_value(records))
    }
}

pub struct SearchVulnerabilitiesTool;

#[async_trait]
impl Tool for SearchVulnerabilitiesTool {
    fn name(&self) -> &str {
        "search_vulnerabilities"
    }

    fn description(&self) -> &str {
        "Searches for vulnerabilities in OpenSearch, with an optional query, time range, and a minimum severity level."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Extra query_string expression AND-ed with the vulnerability group", "default": "*" },
                "time_range": { "type": "string", "description": "Relative time window, e.g. 1h, 24h, 7d", "default": "1h" },
                "min_level": { "type": "integer", "description": "Minimum rule.level (inclusive)", "default": 7 }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let params: VulnerabilityParams = parse_params(params)?;
        let records = ctx.service().search_vulnerabilities(&params).await?;
        Ok(records_to_value(records))
    }
}

/// Registry of callable tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding the four search tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchRawLogsTool));
        registry.register(Box::new(SearchAlertsTool));
        registry.register(Box::new(GetAgentDataTool));
        registry.register(Box::new(SearchVulnerabilitiesTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
