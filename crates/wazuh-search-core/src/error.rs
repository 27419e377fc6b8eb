//! Error taxonomy for search operations.

/// Failure kinds surfaced by the search pipeline.
///
/// Only [`SearchError::Validation`] is produced before any backend
/// interaction. The remaining kinds are execution failures; the dispatcher
/// either surfaces them or collapses them into an empty result depending on
/// its [`FailureMode`](crate::service::FailureMode).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// The caller omitted a required input or supplied an unusable one.
    #[error("{0}")]
    Validation(String),

    /// The backend handle failed to connect at startup.
    #[error("OpenSearch client not initialized: {0}")]
    Connection(String),

    /// The backend accepted the call but rejected or failed the query.
    #[error("OpenSearch query failed: {0}")]
    Backend(String),

    /// The response envelope is missing the expected `hits.hits` structure.
    #[error("malformed OpenSearch response: {0}")]
    MalformedResponse(String),
}

impl SearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures that happened while executing the query rather
    /// than while validating its inputs.
    pub fn is_execution_failure(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}
