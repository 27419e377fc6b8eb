//! OpenSearch HTTP backend.
//!
//! Implements [`SearchBackend`] with `reqwest`: every search is a
//! `POST {base_url}/{index_pattern}/_search` carrying the structured query
//! body, authenticated with HTTP basic auth when a username is configured.
//!
//! [`connect`] performs the one-time startup probe (`GET /`) and turns its
//! outcome into a [`ConnectionHandle`]. A failed probe is logged and
//! produces a handle in the failed state; nothing retries it later.
//!
//! # TLS
//!
//! Wazuh indexers usually run with self-signed certificates, so
//! `verify_certs` defaults to `false`. Set it to `true` once the cluster has
//! proper certificates.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use wazuh_search_core::{ConnectionHandle, SearchBackend, SearchError};

use crate::config::BackendConfig;

/// OpenSearch REST client.
pub struct OpenSearchClient {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl OpenSearchClient {
    /// Build a client from configuration. Performs no I/O.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .context("Failed to build OpenSearch HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => req.basic_auth(user, self.password.as_ref()),
            None => req,
        }
    }

    /// Fetch cluster info (`GET /`).
    pub async fn info(&self) -> Result<Value> {
        let resp = self
            .authorize(self.client.get(format!("{}/", self.base_url)))
            .send()
            .await
            .with_context(|| format!("Failed to reach OpenSearch at {}", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenSearch returned {}: {}", status, body);
        }

        resp.json()
            .await
            .context("Failed to decode OpenSearch cluster info")
    }
}

#[async_trait]
impl SearchBackend for OpenSearchClient {
    fn name(&self) -> &str {
        "opensearch"
    }

    async fn search(&self, index_pattern: &str, body: &Value) -> Result<Value, SearchError> {
        let url = format!("{}/{}/_search", self.base_url, index_pattern);

        let resp = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| SearchError::Backend(describe_transport_error(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SearchError::Backend(format!(
                "{} on {}: {}",
                status,
                index_pattern,
                backend_reason(&text)
            )));
        }

        resp.json()
            .await
            .map_err(|e| SearchError::Backend(format!("undecodable response body: {}", e)))
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

/// Pulls `error.reason` out of an OpenSearch error body, falling back to the
/// raw text.
fn backend_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("reason"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Cluster name and version number from a `GET /` response.
fn cluster_summary(info: &Value) -> (&str, &str) {
    let cluster = info
        .get("cluster_name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let version = info
        .get("version")
        .and_then(|v| v.get("number"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    (cluster, version)
}

/// Connect once at startup.
///
/// Builds the client and probes the cluster. Any failure yields a handle in
/// the failed state carrying the reason; callers using that handle get a
/// connection error on every search without further network traffic.
pub async fn connect(config: &BackendConfig) -> ConnectionHandle {
    let client = match OpenSearchClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Error connecting to OpenSearch");
            return ConnectionHandle::failed(format!("{:#}", e));
        }
    };

    match client.info().await {
        Ok(info) => {
            let (cluster, version) = cluster_summary(&info);
            tracing::info!(
                url = %client.base_url(),
                cluster = %cluster,
                version = %version,
                "Connected to OpenSearch cluster"
            );
            ConnectionHandle::connected(Arc::new(client))
        }
        Err(e) => {
            let reason = format!("{:#}", e);
            tracing::error!(url = %client.base_url(), error = %reason, "Error connecting to OpenSearch");
            ConnectionHandle::failed(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_reason_extracts_error_reason() {
        let body = r#"{"error":{"root_cause":[],"type":"search_phase_execution_exception","reason":"all shards failed"},"status":400}"#;
        assert_eq!(backend_reason(body), "all shards failed");
    }

    #[test]
    fn test_backend_reason_falls_back_to_text() {
        assert_eq!(backend_reason("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_cluster_summary() {
        let info = serde_json::json!({
            "cluster_name": "wazuh-cluster",
            "version": { "number": "2.11.1" }
        });
        assert_eq!(cluster_summary(&info), ("wazuh-cluster", "2.11.1"));
        assert_eq!(
            cluster_summary(&serde_json::json!({})),
            ("unknown", "unknown")
        );
    }

    #[test]
    fn test_client_builds_without_io() {
        let cfg = BackendConfig {
            host: "indexer".to_string(),
            use_ssl: false,
            ..Default::default()
        };
        let client = OpenSearchClient::new(&cfg).unwrap();
        assert_eq!(client.base_url(), "http://indexer:9200");
    }
}
