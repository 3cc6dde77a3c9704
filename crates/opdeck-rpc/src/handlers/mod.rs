//! JSON-RPC request handlers, split by domain.

mod apps;
mod services;
mod system;

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use opdeck_core::{ConsoleError, Result, ServiceController};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

// ============================================================================
// Parameter extraction helpers
// ============================================================================

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(params: &Value, snake: &str, camel: &str) -> Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| ConsoleError::Validation {
            field: snake.to_string(),
            message: format!("Missing required parameter: {}", snake),
        })
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Run a controller call on the blocking pool.
///
/// Every controller call refreshes the process table and may shell out to
/// nvidia-smi, so none of them run on the async workers.
pub(crate) async fn with_controller<T, F>(state: &AppState, f: F) -> Result<T>
where
    F: FnOnce(&ServiceController) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let controller = Arc::clone(&state.controller);
    tokio::task::spawn_blocking(move || f(&controller))
        .await
        .map_err(|e| ConsoleError::Other(format!("Controller task failed: {}", e)))?
}

// ============================================================================
// HTTP endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "platform": opdeck_core::platform::current_platform(),
    }))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    match dispatch_method(&state, method, &params).await {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            if e.is_benign_race() {
                warn!("RPC {} raced process exit: {}", method, e);
            } else {
                error!("RPC error for {}: {}", method, e);
            }
            let code = e.to_rpc_error_code();
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, code, e.to_string())),
            )
        }
    }
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the appropriate domain handler.
async fn dispatch_method(state: &AppState, method: &str, params: &Value) -> Result<Value> {
    match method {
        // Services
        "list_services" => services::list_services(state, params).await,
        "get_service_status" => services::get_service_status(state, params).await,
        "is_service_running" => services::is_service_running(state, params).await,
        "get_service_gpu" => services::get_service_gpu(state, params).await,
        "start_service" => services::start_service(state, params).await,
        "stop_service" => services::stop_service(state, params).await,
        "toggle_service" => services::toggle_service(state, params).await,
        "probe_service" => services::probe_service(state, params).await,

        // Applications & scripts
        "start_app" => apps::start_app(state, params).await,
        "stop_app" => apps::stop_app(state, params).await,
        "run_script" => apps::run_script(state, params).await,

        // System telemetry
        "get_system_info" => system::get_system_info(state, params).await,
        "get_gpu_info" => system::get_gpu_info(state, params).await,
        "get_running_apps" => system::get_running_apps(state, params).await,

        // Unknown method
        _ => {
            warn!("Method not found: {}", method);
            Err(ConsoleError::Other(format!("Method not found: {}", method)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
