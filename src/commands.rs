//! CLI command implementations.
//!
//! Every `wzs search ...` command goes through the same [`ToolRegistry`]
//! the servers use, so the CLI shows exactly what an MCP client would get.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;

use wazuh_search_core::{ConnectionState, SearchService};

use crate::config::Config;
use crate::opensearch;
use crate::tools::{ToolContext, ToolRegistry};

/// Connect to the backend once and wrap it in a tool context.
pub async fn build_context(config: &Config) -> ToolContext {
    let handle = opensearch::connect(&config.backend).await;
    let service = SearchService::new(handle, config.indices.clone())
        .with_failure_mode(config.search.failure_mode);
    ToolContext::new(Arc::new(service))
}

/// Run a registered tool and print its result as pretty JSON.
pub async fn run_tool(ctx: &ToolContext, tools: &ToolRegistry, name: &str, params: Value) -> Result<()> {
    let tool = tools
        .find(name)
        .with_context(|| format!("no tool registered with name: {}", name))?;

    let result = tool.execute(params, ctx).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Report the startup connection outcome. Fails when the backend is
/// unreachable so scripts can use the exit status.
pub fn run_ping(ctx: &ToolContext) -> Result<()> {
    let handle = ctx.service().handle();
    match handle.state() {
        ConnectionState::Connected => {
            println!("OpenSearch: connected");
            Ok(())
        }
        ConnectionState::Failed => {
            println!("OpenSearch: failed");
            anyhow::bail!(
                "{}",
                handle.failure_reason().unwrap_or("unknown connection failure")
            )
        }
    }
}

/// Print the tool list with parameter schemas.
pub fn list_tools(tools: &ToolRegistry) -> Result<()> {
    let listing: Vec<Value> = tools
        .tools()
        .iter()
        .map(|t| {
            json!({
                "name": t.name(),
                "description": t.description(),
                "parameters": t.parameters_schema(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
