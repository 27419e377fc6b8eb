//! # Wazuh Search
//!
//! **Read-only search tools over Wazuh security telemetry stored in
//! OpenSearch.**
//!
//! Four named operations translate small intents (free-text query, relative
//! time window, minimum severity, agent identifier) into OpenSearch `bool`
//! queries against fixed Wazuh index patterns, then return each hit's
//! `_source` as a plain record.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  ┌──────────┐  ┌──────────┐
//! │   MCP    │  │   HTTP   │  │   CLI    │
//! │ (stdio)  │  │ REST+MCP │  │  (wzs)   │
//! └────┬─────┘  └────┬─────┘  └────┬─────┘
//!      └─────────────┼─────────────┘
//!                    ▼
//!             ┌──────────────┐      ┌──────────────┐
//!             │ ToolRegistry │─────▶│ SearchService│ (core)
//!             └──────────────┘      └──────┬───────┘
//!                                          ▼
//!                                  ┌──────────────┐
//!                                  │  OpenSearch  │
//!                                  └──────────────┘
//! ```
//!
//! ## Operations
//!
//! | Tool | Index | Filters |
//! |------|-------|---------|
//! | `search_raw_logs` | `wazuh-archives-*` | time window |
//! | `search_alerts` | `wazuh-alerts-*` | time window, `rule.level` |
//! | `get_agent_data` | `wazuh-agent-*` | agent id or name, 1 result |
//! | `search_vulnerabilities` | `wazuh-alerts-*` | vulnerability group, time window, `rule.level` |
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`opensearch`] | OpenSearch HTTP backend and startup connection |
//! | [`tools`] | `Tool` trait, the four search tools, `ToolRegistry` |
//! | [`mcp`] | MCP protocol bridge and stdio transport |
//! | [`server`] | Axum HTTP server (REST + MCP Streamable HTTP) |
//! | [`commands`] | CLI command implementations |
//!
//! The query builder, normalizer, backend trait, and dispatcher live in the
//! [`wazuh_search_core`] crate; its main types are re-exported here.

pub mod commands;
pub mod config;
pub mod mcp;
pub mod opensearch;
pub mod server;
pub mod tools;

pub use wazuh_search_core::{ConnectionHandle, Record, SearchError, SearchService};
