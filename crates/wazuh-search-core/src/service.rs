//! Operation dispatcher.
//!
//! [`SearchService`] exposes one async method per named operation. Each
//! follows the same contract:
//!
//! 1. Validate required inputs (fails with [`SearchError::Validation`]
//!    before anything else happens).
//! 2. Build the [`StructuredQuery`](crate::query::StructuredQuery).
//! 3. Execute against the operation's fixed index pattern and page size.
//! 4. Normalize the response into records.
//!
//! Execution failures (connection, backend, malformed response) are
//! handled according to the service's [`FailureMode`].

use serde::{Deserialize, Serialize};

use crate::backend::{ConnectionHandle, ConnectionState};
use crate::error::SearchError;
use crate::models::{
    AgentParams, AlertParams, Operation, RawLogParams, Record, SearchIntent, VulnerabilityParams,
};
use crate::normalize::extract_records;
use crate::query;

fn default_archives() -> String {
    "wazuh-archives-*".to_string()
}
fn default_alerts() -> String {
    "wazuh-alerts-*".to_string()
}
fn default_agents() -> String {
    "wazuh-agent-*".to_string()
}

/// Index patterns each operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexPatterns {
    /// Raw log archive (`search_raw_logs`).
    #[serde(default = "default_archives")]
    pub archives: String,
    /// Alerts (`search_alerts`, `search_vulnerabilities`).
    #[serde(default = "default_alerts")]
    pub alerts: String,
    /// Agent status (`get_agent_data`).
    #[serde(default = "default_agents")]
    pub agents: String,
}

impl Default for IndexPatterns {
    fn default() -> Self {
        Self {
            archives: default_archives(),
            alerts: default_alerts(),
            agents: default_agents(),
        }
    }
}

/// What to do with execution failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Log the failure and return an empty result, so callers cannot tell
    /// it apart from zero matches.
    #[default]
    Lenient,
    /// Return the failure to the caller.
    Strict,
}

/// One entry point per named search operation.
///
/// Holds no per-call state; share it behind an `Arc` across concurrent
/// callers.
#[derive(Debug, Clone)]
pub struct SearchService {
    handle: ConnectionHandle,
    indices: IndexPatterns,
    failure_mode: FailureMode,
}

impl SearchService {
    pub fn new(handle: ConnectionHandle, indices: IndexPatterns) -> Self {
        Self {
            handle,
            indices,
            failure_mode: FailureMode::default(),
        }
    }

    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn indices(&self) -> &IndexPatterns {
        &self.indices
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Free-text search over the raw log archive.
    pub async fn search_raw_logs(&self, params: &RawLogParams) -> Result<Vec<Record>, SearchError> {
        let intent = self.raw_logs_intent(params)?;
        self.run(intent).await
    }

    /// Free-text search over alerts at or above `min_level`.
    pub async fn search_alerts(&self, params: &AlertParams) -> Result<Vec<Record>, SearchError> {
        let intent = self.alerts_intent(params)?;
        self.run(intent).await
    }

    /// Status record for a single agent, looked up by id or name.
    pub async fn get_agent_data(&self, params: &AgentParams) -> Result<Vec<Record>, SearchError> {
        let intent = self.agent_intent(params)?;
        self.run(intent).await
    }

    /// Vulnerability-detector alerts, optionally narrowed by a query.
    pub async fn search_vulnerabilities(
        &self,
        params: &VulnerabilityParams,
    ) -> Result<Vec<Record>, SearchError> {
        let intent = self.vulnerabilities_intent(params);
        self.run(intent).await
    }

    pub fn raw_logs_intent(&self, params: &RawLogParams) -> Result<SearchIntent, SearchError> {
        let free_text = required_query(params.query.as_deref())?;
        Ok(self.intent(
            Operation::SearchRawLogs,
            query::build_log_query(free_text, &params.time_range),
            &self.indices.archives,
        ))
    }

    pub fn alerts_intent(&self, params: &AlertParams) -> Result<SearchIntent, SearchError> {
        let free_text = required_query(params.query.as_deref())?;
        Ok(self.intent(
            Operation::SearchAlerts,
            query::build_alert_query(free_text, &params.time_range, params.min_level),
            &self.indices.alerts,
        ))
    }

    pub fn agent_intent(&self, params: &AgentParams) -> Result<SearchIntent, SearchError> {
        let structured =
            query::build_agent_query(params.agent_id.as_deref(), params.agent_name.as_deref())?;
        Ok(self.intent(Operation::GetAgentData, structured, &self.indices.agents))
    }

    pub fn vulnerabilities_intent(&self, params: &VulnerabilityParams) -> SearchIntent {
        self.intent(
            Operation::SearchVulnerabilities,
            query::build_vulnerability_query(
                Some(params.query.as_str()),
                &params.time_range,
                params.min_level,
            ),
            &self.indices.alerts,
        )
    }

    fn intent(
        &self,
        operation: Operation,
        structured: query::StructuredQuery,
        index_pattern: &str,
    ) -> SearchIntent {
        SearchIntent {
            operation,
            query: structured,
            index_pattern: index_pattern.to_string(),
            page_size: operation.page_size(),
        }
    }

    async fn run(&self, intent: SearchIntent) -> Result<Vec<Record>, SearchError> {
        match self.execute(&intent).await {
            Ok(records) => {
                tracing::debug!(
                    operation = %intent.operation,
                    index = %intent.index_pattern,
                    hits = records.len(),
                    "search completed"
                );
                Ok(records)
            }
            Err(e) => match self.failure_mode {
                FailureMode::Lenient => {
                    tracing::error!(
                        operation = %intent.operation,
                        index = %intent.index_pattern,
                        error = %e,
                        "search failed, returning no results"
                    );
                    Ok(Vec::new())
                }
                FailureMode::Strict => {
                    tracing::error!(
                        operation = %intent.operation,
                        index = %intent.index_pattern,
                        error = %e,
                        "search failed"
                    );
                    Err(e)
                }
            },
        }
    }

    async fn execute(&self, intent: &SearchIntent) -> Result<Vec<Record>, SearchError> {
        let response = self
            .handle
            .execute(&intent.query, &intent.index_pattern, intent.page_size)
            .await?;
        extract_records(&response)
    }
}

fn required_query(query: Option<&str>) -> Result<&str, SearchError> {
    match query {
        Some(q) if !q.trim().is_empty() => Ok(q),
        Some(_) => Err(SearchError::validation("query must not be empty")),
        None => Err(SearchError::validation("query is required")),
    }
}
