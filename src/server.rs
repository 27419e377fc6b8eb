//! HTTP server.
//!
//! Serves the search tools over two HTTP surfaces on one listener:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Version and backend connection state |
//! | `GET`  | `/tools/list` | All registered tools with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool; returns `{ "result": [...] }`. No body means `{}` |
//! | any    | `/mcp` | MCP Streamable HTTP endpoint |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `backend_error`
//! (502), `backend_unavailable` (503), `tool_error` (500). The backend
//! codes only appear when the search failure mode is `strict`; in the
//! default lenient mode backend failures yield an empty `result`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use wazuh_search_core::{ConnectionState, SearchError};

use crate::mcp::McpBridge;
use crate::tools::{ToolContext, ToolRegistry};

/// Shared state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

/// Build the full router: REST endpoints plus the MCP endpoint.
pub fn router(ctx: ToolContext, tools: Arc<ToolRegistry>) -> Router {
    let bridge = McpBridge::new(ctx.clone(), tools.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(AppState { ctx, tools })
}

/// Bind `bind_addr` and serve until the process is terminated.
pub async fn run_server(
    bind_addr: &str,
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
) -> anyhow::Result<()> {
    let app = router(ctx, tools);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "HTTP server listening (REST at /tools, MCP at /mcp)");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Maps a tool failure to a status code by its [`SearchError`] kind.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {}", tool_name, err);
    let (status, code) = match err.downcast_ref::<SearchError>() {
        Some(SearchError::Validation(_)) => (StatusCode::BAD_REQUEST, "bad_request"),
        Some(SearchError::Connection(_)) => (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable"),
        Some(SearchError::Backend(_)) | Some(SearchError::MalformedResponse(_)) => {
            (StatusCode::BAD_GATEWAY, "backend_error")
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "tool_error"),
    };
    AppError {
        status,
        code,
        message,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    backend: ConnectionState,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.ctx.service().connection_state(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters_schema(),
        })
        .collect();

    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Option<Json<serde_json::Value>>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    // No body means no parameters.
    let params = match body {
        Ok(Some(Json(params))) => params,
        Ok(None) => serde_json::Value::Object(serde_json::Map::new()),
        Err(rejection) => return Err(bad_request(rejection.body_text())),
    };

    let result = tool
        .execute(params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
