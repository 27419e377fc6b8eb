//! OpenSearch HTTP backend against a mock server.

use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;

use wazuh_search::config::BackendConfig;
use wazuh_search::opensearch::{connect, OpenSearchClient};
use wazuh_search_core::models::{AgentParams, AlertParams};
use wazuh_search_core::{
    ConnectionState, FailureMode, IndexPatterns, SearchBackend, SearchError, SearchService,
};

fn backend_config(server: &mockito::ServerGuard) -> BackendConfig {
    let addr = server.socket_address();
    BackendConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        username: Some("admin".to_string()),
        password: Some("secret".to_string()),
        use_ssl: false,
        verify_certs: false,
        timeout_secs: 5,
    }
}

async fn mock_info(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"cluster_name":"wazuh-cluster","version":{"number":"2.11.1"}}"#)
        .create_async()
        .await
}

#[tokio::test]
async fn test_connect_probes_cluster_once() {
    let mut server = mockito::Server::new_async().await;
    let info = mock_info(&mut server).await;

    let handle = connect(&backend_config(&server)).await;
    assert_eq!(handle.state(), ConnectionState::Connected);
    assert!(handle.failure_reason().is_none());
    info.assert_async().await;
}

#[tokio::test]
async fn test_failed_probe_yields_failed_handle_and_no_searches() {
    let mut server = mockito::Server::new_async().await;
    let info = server
        .mock("GET", "/")
        .with_status(401)
        .with_body("Unauthorized")
        .expect(1)
        .create_async()
        .await;
    let search = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let handle = connect(&backend_config(&server)).await;
    assert_eq!(handle.state(), ConnectionState::Failed);
    assert!(handle.failure_reason().unwrap().contains("401"));

    let svc = SearchService::new(handle, IndexPatterns::default());
    let records = svc.search_alerts(&AlertParams::new("sshd")).await.unwrap();
    assert!(records.is_empty());

    info.assert_async().await;
    search.assert_async().await;
}

#[tokio::test]
async fn test_search_posts_body_with_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    mock_info(&mut server).await;
    let search = server
        .mock("POST", "/wazuh-agent-*/_search")
        // admin:secret
        .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
        .match_body(Matcher::Json(json!({
            "query": { "bool": { "must": [{ "query_string": { "query": "agent.id:\"001\"" } }] } },
            "size": 1
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "took": 2,
                "hits": {
                    "total": { "value": 1, "relation": "eq" },
                    "hits": [{
                        "_index": "wazuh-agent-2024",
                        "_id": "001",
                        "_source": { "agent": { "id": "001", "name": "web-01" }, "status": "active" }
                    }]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let handle = connect(&backend_config(&server)).await;
    let svc = SearchService::new(handle, IndexPatterns::default());
    let records = svc.get_agent_data(&AgentParams::by_id("001")).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["agent"]["name"], "web-01");
    search.assert_async().await;
}

#[tokio::test]
async fn test_rejected_query_is_backend_error() {
    let mut server = mockito::Server::new_async().await;
    mock_info(&mut server).await;
    server
        .mock("POST", "/wazuh-alerts-*/_search")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"error":{"type":"search_phase_execution_exception","reason":"Failed to parse query [((]"},"status":400}"#,
        )
        .create_async()
        .await;

    let handle = connect(&backend_config(&server)).await;

    let strict = SearchService::new(handle.clone(), IndexPatterns::default())
        .with_failure_mode(FailureMode::Strict);
    let err = strict
        .search_alerts(&AlertParams::new("(("))
        .await
        .unwrap_err();
    match err {
        SearchError::Backend(msg) => assert!(msg.contains("Failed to parse query"), "{}", msg),
        other => panic!("expected backend error, got {:?}", other),
    }

    let lenient = SearchService::new(handle, IndexPatterns::default());
    assert!(lenient
        .search_alerts(&AlertParams::new("(("))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_client_without_credentials_sends_no_auth() {
    let mut server = mockito::Server::new_async().await;
    let search = server
        .mock("POST", "/idx/_search")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"hits":{"hits":[]}}"#)
        .create_async()
        .await;

    let cfg = BackendConfig {
        username: None,
        password: None,
        ..backend_config(&server)
    };
    let client = Arc::new(OpenSearchClient::new(&cfg).unwrap());
    let response = client.search("idx", &json!({ "size": 1 })).await.unwrap();
    assert_eq!(response, json!({ "hits": { "hits": [] } }));
    search.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_backend_fails_connect() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let cfg = BackendConfig {
        host: "127.0.0.1".to_string(),
        port,
        use_ssl: false,
        timeout_secs: 2,
        ..Default::default()
    };
    let handle = connect(&cfg).await;
    assert_eq!(handle.state(), ConnectionState::Failed);
}
