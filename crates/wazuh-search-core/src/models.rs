//! Core data models: records, per-operation parameters, and search intents.
//!
//! Parameter structs deserialize straight from tool-call JSON, so their
//! serde defaults are the operation defaults.

use serde::{Deserialize, Serialize};

use crate::query::StructuredQuery;

/// One backend document's stored fields (`_source`).
///
/// Documents are heterogeneous, so this stays an open map rather than a
/// fixed struct.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Default relative time window for every time-bounded operation.
pub const DEFAULT_TIME_RANGE: &str = "1h";

/// Default minimum `rule.level` for alert searches.
pub const DEFAULT_ALERT_MIN_LEVEL: i64 = 0;

/// Default minimum `rule.level` for vulnerability searches.
pub const DEFAULT_VULNERABILITY_MIN_LEVEL: i64 = 7;

/// The `query_string` token that matches every document.
pub const MATCH_ALL: &str = "*";

/// Page size for list-style operations.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Page size for the single-agent lookup.
pub const AGENT_PAGE_SIZE: usize = 1;

fn default_time_range() -> String {
    DEFAULT_TIME_RANGE.to_string()
}

fn default_alert_min_level() -> i64 {
    DEFAULT_ALERT_MIN_LEVEL
}

fn default_vulnerability_min_level() -> i64 {
    DEFAULT_VULNERABILITY_MIN_LEVEL
}

fn default_match_all() -> String {
    MATCH_ALL.to_string()
}

/// Parameters for `search_raw_logs`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLogParams {
    /// Free-text `query_string` expression. Required.
    #[serde(default)]
    pub query: Option<String>,
    /// Relative time window, e.g. `"1h"`, `"24h"`, `"7d"`.
    #[serde(default = "default_time_range")]
    pub time_range: String,
}

impl RawLogParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            time_range: default_time_range(),
        }
    }

    pub fn time_range(mut self, time_range: impl Into<String>) -> Self {
        self.time_range = time_range.into();
        self
    }
}

/// Parameters for `search_alerts`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_time_range")]
    pub time_range: String,
    /// Minimum `rule.level` (inclusive).
    #[serde(default = "default_alert_min_level")]
    pub min_level: i64,
}

impl AlertParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            time_range: default_time_range(),
            min_level: DEFAULT_ALERT_MIN_LEVEL,
        }
    }

    pub fn time_range(mut self, time_range: impl Into<String>) -> Self {
        self.time_range = time_range.into();
        self
    }

    pub fn min_level(mut self, min_level: i64) -> Self {
        self.min_level = min_level;
        self
    }
}

/// Parameters for `get_agent_data`. One identifier is required; `agent_id`
/// wins when both are present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentParams {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
}

impl AgentParams {
    pub fn by_id(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            agent_name: None,
        }
    }

    pub fn by_name(agent_name: impl Into<String>) -> Self {
        Self {
            agent_id: None,
            agent_name: Some(agent_name.into()),
        }
    }
}

/// Parameters for `search_vulnerabilities`. Every field is optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VulnerabilityParams {
    #[serde(default = "default_match_all")]
    pub query: String,
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_vulnerability_min_level")]
    pub min_level: i64,
}

impl Default for VulnerabilityParams {
    fn default() -> Self {
        Self {
            query: default_match_all(),
            time_range: default_time_range(),
            min_level: DEFAULT_VULNERABILITY_MIN_LEVEL,
        }
    }
}

/// The four named search operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SearchRawLogs,
    SearchAlerts,
    GetAgentData,
    SearchVulnerabilities,
}

impl Operation {
    /// The operation's public name, as exposed to tool callers.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::SearchRawLogs => "search_raw_logs",
            Operation::SearchAlerts => "search_alerts",
            Operation::GetAgentData => "get_agent_data",
            Operation::SearchVulnerabilities => "search_vulnerabilities",
        }
    }

    pub fn page_size(&self) -> usize {
        match self {
            Operation::GetAgentData => AGENT_PAGE_SIZE,
            _ => DEFAULT_PAGE_SIZE,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully resolved search: what to ask, where, and how many.
///
/// Built fresh for every call and consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchIntent {
    pub operation: Operation,
    pub query: StructuredQuery,
    pub index_pattern: String,
    pub page_size: usize,
}
