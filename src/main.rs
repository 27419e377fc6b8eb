//! # Wazuh Search CLI (`wzs`)
//!
//! Serves the Wazuh search tools over MCP (stdio or HTTP) and runs them
//! directly from the command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wzs serve stdio` | MCP server on stdin/stdout |
//! | `wzs serve http` | REST + MCP Streamable HTTP server |
//! | `wzs search logs "<query>"` | Search the raw log archive |
//! | `wzs search alerts "<query>"` | Search alerts above a level |
//! | `wzs search agent --id 001` | Look up one agent |
//! | `wzs search vulns` | Search vulnerability-detector alerts |
//! | `wzs ping` | Report the OpenSearch connection state |
//! | `wzs tools` | List tools and their parameter schemas |
//!
//! ## MCP client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "wazuh-opensearch": {
//!       "command": "wzs",
//!       "args": ["--config", "/etc/wzs/wzs.toml", "serve", "stdio"]
//!     }
//!   }
//! }
//! ```

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use wazuh_search::tools::ToolRegistry;
use wazuh_search::{commands, config, mcp, server};

/// Wazuh Search: read-only search tools over Wazuh data in OpenSearch.
#[derive(Parser)]
#[command(name = "wzs", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Optional; environment variables
    /// (`OPENSEARCH_HOST`, `OPENSEARCH_PORT`, `OPENSEARCH_USER`,
    /// `OPENSEARCH_PASSWORD`) override it.
    #[arg(long, global = true, default_value = "./config/wzs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a server.
    Serve {
        #[command(subcommand)]
        transport: ServeTransport,
    },

    /// Run a search operation and print the records as JSON.
    Search {
        #[command(subcommand)]
        operation: SearchOperation,
    },

    /// Connect to OpenSearch and report the result.
    Ping,

    /// List tools and their parameter schemas.
    Tools,
}

#[derive(Subcommand)]
enum ServeTransport {
    /// MCP over stdin/stdout.
    Stdio,
    /// REST endpoints plus MCP Streamable HTTP at `/mcp`, bound to `[server].bind`.
    Http {
        /// Override the bind address from config.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
enum SearchOperation {
    /// Search the raw log archive.
    Logs {
        /// OpenSearch query_string expression.
        query: String,
        /// Relative time window (e.g. `1h`, `24h`, `7d`).
        #[arg(long, default_value = "1h")]
        time_range: String,
    },
    /// Search alerts at or above a minimum rule level.
    Alerts {
        query: String,
        #[arg(long, default_value = "1h")]
        time_range: String,
        #[arg(long, default_value_t = 0)]
        min_level: i64,
    },
    /// Look up a single agent by id or name (id wins if both are given).
    Agent {
        #[arg(long = "id")]
        agent_id: Option<String>,
        #[arg(long = "name")]
        agent_name: Option<String>,
    },
    /// Search vulnerability-detector alerts.
    Vulns {
        /// Extra query_string expression AND-ed with the vulnerability group.
        #[arg(default_value = "*")]
        query: String,
        #[arg(long, default_value = "1h")]
        time_range: String,
        #[arg(long, default_value_t = 7)]
        min_level: i64,
    },
}

fn init_tracing() {
    // Stdout carries MCP frames and JSON output; logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let tools = Arc::new(ToolRegistry::with_builtins());

    if let Commands::Tools = cli.command {
        return commands::list_tools(&tools);
    }

    let ctx = commands::build_context(&cfg).await;

    match cli.command {
        Commands::Serve { transport } => match transport {
            ServeTransport::Stdio => {
                mcp::serve_stdio(mcp::McpBridge::new(ctx, tools)).await?;
            }
            ServeTransport::Http { bind } => {
                let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
                server::run_server(&bind, ctx, tools).await?;
            }
        },
        Commands::Search { operation } => {
            let (name, params) = match operation {
                SearchOperation::Logs { query, time_range } => (
                    "search_raw_logs",
                    json!({ "query": query, "time_range": time_range }),
                ),
                SearchOperation::Alerts {
                    query,
                    time_range,
                    min_level,
                } => (
                    "search_alerts",
                    json!({ "query": query, "time_range": time_range, "min_level": min_level }),
                ),
                SearchOperation::Agent {
                    agent_id,
                    agent_name,
                } => (
                    "get_agent_data",
                    json!({ "agent_id": agent_id, "agent_name": agent_name }),
                ),
                SearchOperation::Vulns {
                    query,
                    time_range,
                    min_level,
                } => (
                    "search_vulnerabilities",
                    json!({ "query": query, "time_range": time_range, "min_level": min_level }),
                ),
            };
            commands::run_tool(&ctx, &tools, name, params).await?;
        }
        Commands::Ping => {
            commands::run_ping(&ctx)?;
        }
        Commands::Tools => unreachable!(),
    }

    Ok(())
}
