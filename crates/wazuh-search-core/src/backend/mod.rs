//! Search backend abstraction and the connection handle.
//!
//! The [`SearchBackend`] trait is the minimal subset of a document-search
//! query DSL the dispatcher depends on: run a `_search` body against an
//! index pattern and hand back the raw JSON envelope. Any engine that can
//! answer `bool` / `query_string` / `range` queries is substitutable.
//!
//! [`ConnectionHandle`] wraps a backend together with the outcome of the
//! single startup connection attempt. A handle that failed to connect keeps
//! failing: it never reconnects and never touches the network.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::SearchError;
use crate::query::StructuredQuery;

/// A document-search engine that can execute structured queries.
///
/// Implementations must tolerate concurrent read-only use.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short identifier for logs (e.g. `"opensearch"`, `"memory"`).
    fn name(&self) -> &str;

    /// Run a `_search` request body against `index_pattern`.
    ///
    /// Returns the raw response envelope, or [`SearchError::Backend`] when
    /// the engine rejects or fails the query.
    async fn search(&self, index_pattern: &str, body: &Value) -> Result<Value, SearchError>;
}

/// Observable outcome of the startup connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Clone)]
enum Inner {
    Connected(Arc<dyn SearchBackend>),
    Failed(String),
}

/// Shared handle to the search backend.
///
/// Constructed once at startup and injected into the dispatcher. Cloning is
/// cheap; every clone observes the same state, which never changes after
/// construction.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Inner,
}

impl ConnectionHandle {
    /// A handle backed by a live backend.
    pub fn connected(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            inner: Inner::Connected(backend),
        }
    }

    /// A handle whose startup connection failed with `reason`.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            inner: Inner::Failed(reason.into()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &self.inner {
            Inner::Connected(_) => ConnectionState::Connected,
            Inner::Failed(_) => ConnectionState::Failed,
        }
    }

    /// The startup failure reason, if the handle is in the failed state.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.inner {
            Inner::Connected(_) => None,
            Inner::Failed(reason) => Some(reason),
        }
    }

    /// Execute `query` against `index_pattern`, returning at most
    /// `page_size` hits.
    ///
    /// A failed handle returns [`SearchError::Connection`] immediately.
    pub async fn execute(
        &self,
        query: &StructuredQuery,
        index_pattern: &str,
        page_size: usize,
    ) -> Result<Value, SearchError> {
        match &self.inner {
            Inner::Failed(reason) => Err(SearchError::Connection(reason.clone())),
            Inner::Connected(backend) => {
                let body = query.to_search_body(page_size);
                backend.search(index_pattern, &body).await
            }
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Inner::Connected(backend) => f
                .debug_struct("ConnectionHandle")
                .field("state", &"connected")
                .field("backend", &backend.name())
                .finish(),
            Inner::Failed(reason) => f
                .debug_struct("ConnectionHandle")
                .field("state", &"failed")
                .field("reason", reason)
                .finish(),
        }
    }
}
