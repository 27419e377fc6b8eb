//! # Wazuh Search Core
//!
//! Runtime-free logic for Wazuh Search: the record model, the structured
//! query builder, the response normalizer, the [`backend::SearchBackend`]
//! trait with its connection handle, and the operation dispatcher.
//!
//! This crate contains no tokio, reqwest, or other I/O dependencies. The
//! application crate supplies a concrete backend (OpenSearch over HTTP) and
//! the transports (MCP, HTTP, CLI).
//!
//! ## Pipeline
//!
//! ```text
//! params ──▶ query::build_* ──▶ ConnectionHandle::execute ──▶ normalize ──▶ Vec<Record>
//! ```

pub mod backend;
pub mod error;
pub mod models;
pub mod normalize;
pub mod query;
pub mod service;

pub use backend::{ConnectionHandle, ConnectionState, SearchBackend};
pub use error::SearchError;
pub use models::Record;
pub use service::{FailureMode, IndexPatterns, SearchService};
