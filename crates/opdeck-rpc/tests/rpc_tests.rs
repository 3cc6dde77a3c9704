//! Integration tests for the opdeck-rpc JSON-RPC server.
//!
//! The router is driven in-process against an in-memory process table, so
//! nothing is launched or signalled on the host.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use opdeck_core::config::{AllowedApplication, ConsoleConfig, HealthProbe, ServiceDescriptor};
use opdeck_core::process::{
    LaunchOutcome, LaunchSpec, Launcher, MatchRule, ProcessRecord, ProcessTable,
    ServiceController, Snapshot,
};
use opdeck_core::system::{AcceleratorIndex, GpuDevice, GpuMetrics};
use opdeck_core::{ConsoleError, Result};
use opdeck_rpc::{build_router, AppState};
use serde_json::{json, Value};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

struct FakeTable {
    records: Vec<ProcessRecord>,
    terminated: Mutex<Vec<u32>>,
}

impl ProcessTable for FakeTable {
    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.records.clone())
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        self.terminated.lock().unwrap().push(pid);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<LaunchSpec>>,
}

impl Launcher for RecordingLauncher {
    fn spawn_detached(&self, _target: &str, spec: &LaunchSpec) -> Result<LaunchOutcome> {
        self.launched.lock().unwrap().push(spec.clone());
        Ok(LaunchOutcome { pid: 4242 })
    }
}

struct OneGpu;

impl AcceleratorIndex for OneGpu {
    fn is_available(&self) -> bool {
        true
    }

    fn devices(&self) -> Result<Vec<GpuDevice>> {
        Ok(vec![GpuDevice {
            index: 0,
            name: "Test GPU".to_string(),
            uuid: "GPU-0".to_string(),
            compute_pids: [11].into_iter().collect(),
        }])
    }

    fn metrics(&self) -> Result<Vec<GpuMetrics>> {
        Err(ConsoleError::AcceleratorUnavailable)
    }
}

struct TestServer {
    app: axum::Router,
    table: Arc<FakeTable>,
    launcher: Arc<RecordingLauncher>,
    _scripts: TempDir,
}

/// A local URL with nothing listening behind it.
fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// `worker` runs as PID 10 with a child on the GPU; `idle` is not running
/// and its health endpoint refuses connections.
fn test_server() -> TestServer {
    let scripts = TempDir::new().unwrap();
    fs::write(scripts.path().join("cleanup.sh"), "true").unwrap();

    let config = ConsoleConfig {
        services: vec![
            ServiceDescriptor {
                name: "worker".to_string(),
                display_name: Some("Worker".to_string()),
                match_rule: MatchRule::NameAndToken {
                    name: "worker".to_string(),
                    token: "serve".to_string(),
                },
                launch: LaunchSpec::new("worker").with_arg("serve"),
                probe: None,
            },
            ServiceDescriptor {
                name: "idle".to_string(),
                display_name: None,
                match_rule: MatchRule::CmdlineSubstring {
                    needle: "idle-web".to_string(),
                },
                launch: LaunchSpec::new("idle-web"),
                probe: Some(HealthProbe::Ollama {
                    base_url: closed_port_url(),
                }),
            },
        ],
        allowed_apps: vec![AllowedApplication::new("pad", "pad.exe")],
        scripts_dir: scripts.path().to_path_buf(),
        script_extensions: vec![".sh".to_string()],
    };

    let table = Arc::new(FakeTable {
        records: vec![
            ProcessRecord::new(10, "worker").with_cmdline(["worker", "serve"]),
            ProcessRecord::new(11, "python").with_parent(10),
            ProcessRecord::new(20, "pad"),
            ProcessRecord::new(21, "pad.exe"),
        ],
        terminated: Mutex::new(Vec::new()),
    });
    let launcher = Arc::new(RecordingLauncher::default());

    let controller = ServiceController::new(
        Arc::new(config),
        table.clone(),
        launcher.clone(),
        Arc::new(OneGpu),
    );

    TestServer {
        app: build_router(AppState::new(controller)),
        table,
        launcher,
        _scripts: scripts,
    }
}

/// Make an RPC call and return the full JSON-RPC payload.
async fn rpc_call_raw(app: &axum::Router, method: &str, params: Value) -> Value {
    let body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let request = Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn rpc_result(app: &axum::Router, method: &str, params: Value) -> Value {
    let payload = rpc_call_raw(app, method, params).await;
    assert!(payload.get("error").is_none(), "{} failed: {}", method, payload);
    payload["result"].clone()
}

async fn rpc_error_code(app: &axum::Router, method: &str, params: Value) -> i64 {
    let payload = rpc_call_raw(app, method, params).await;
    payload["error"]["code"]
        .as_i64()
        .unwrap_or_else(|| panic!("{} did not fail: {}", method, payload))
}

#[tokio::test]
async fn test_health() {
    let server = test_server();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_list_services() {
    let server = test_server();
    let result = rpc_result(&server.app, "list_services", json!({})).await;

    let services = result.as_array().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0]["name"], "worker");
    assert_eq!(services[0]["display_name"], "Worker");
    assert_eq!(services[0]["running"], true);
    assert_eq!(services[0]["witness_pid"], 10);
    assert_eq!(services[0]["gpu"]["gpu_index"], 0);
    assert_eq!(services[1]["running"], false);
    assert_eq!(services[1]["gpu"]["gpu_index"], -1);
}

#[tokio::test]
async fn test_service_gpu_through_child() {
    let server = test_server();

    let gpu = rpc_result(&server.app, "get_service_gpu", json!({"service": "worker"})).await;
    assert_eq!(gpu, json!({"gpu_index": 0, "gpu_name": "Test GPU"}));

    let gpu = rpc_result(&server.app, "get_service_gpu", json!({"service": "idle"})).await;
    assert_eq!(gpu, json!({"gpu_index": -1, "gpu_name": ""}));
}

#[tokio::test]
async fn test_is_service_running() {
    let server = test_server();
    let running = rpc_result(&server.app, "is_service_running", json!({"service": "worker"})).await;
    assert_eq!(running, json!(true));
}

#[tokio::test]
async fn test_start_running_service_is_precondition_error() {
    let server = test_server();
    let code = rpc_error_code(&server.app, "start_service", json!({"service": "worker"})).await;
    assert_eq!(code, -32010);
    assert!(server.launcher.launched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_stopped_service() {
    let server = test_server();
    let result = rpc_result(&server.app, "start_service", json!({"service": "idle"})).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["pid"], 4242);
    assert_eq!(server.launcher.launched.lock().unwrap()[0].program, "idle-web");
}

#[tokio::test]
async fn test_stop_service() {
    let server = test_server();

    let code = rpc_error_code(&server.app, "stop_service", json!({"service": "idle"})).await;
    assert_eq!(code, -32010);
    assert!(server.table.terminated.lock().unwrap().is_empty());

    let result = rpc_result(&server.app, "stop_service", json!({"service": "worker"})).await;
    assert_eq!(result["pid"], 10);
    assert_eq!(*server.table.terminated.lock().unwrap(), vec![10]);
}

#[tokio::test]
async fn test_toggle_service() {
    let server = test_server();

    let result = rpc_result(
        &server.app,
        "toggle_service",
        json!({"service": "idle", "action": "start"}),
    )
    .await;
    assert_eq!(result["outcome"]["action"], "started");

    let code = rpc_error_code(
        &server.app,
        "toggle_service",
        json!({"service": "idle", "action": "restart"}),
    )
    .await;
    assert_eq!(code, -32005);
}

#[tokio::test]
async fn test_unknown_service() {
    let server = test_server();
    let code = rpc_error_code(&server.app, "get_service_status", json!({"service": "nope"})).await;
    assert_eq!(code, -32013);
}

#[tokio::test]
async fn test_start_app_whitelist() {
    let server = test_server();

    let code = rpc_error_code(&server.app, "start_app", json!({"app_name": "unknown"})).await;
    assert_eq!(code, -32012);
    assert!(server.launcher.launched.lock().unwrap().is_empty());

    let result = rpc_result(&server.app, "start_app", json!({"appName": "pad"})).await;
    assert_eq!(result["success"], true);
    assert_eq!(server.launcher.launched.lock().unwrap()[0].program, "pad.exe");
}

#[tokio::test]
async fn test_stop_app_by_name() {
    let server = test_server();

    let result = rpc_result(&server.app, "stop_app", json!({"app_name": "PAD"})).await;
    assert_eq!(result["signalled"], json!([20, 21]));

    let code = rpc_error_code(&server.app, "stop_app", json!({"app_name": "ghost"})).await;
    assert_eq!(code, -32013);
}

#[tokio::test]
async fn test_run_script() {
    let server = test_server();

    let result = rpc_result(&server.app, "run_script", json!({"script_name": "cleanup.sh"})).await;
    assert_eq!(result["success"], true);

    let code = rpc_error_code(&server.app, "run_script", json!({"script_name": "../cleanup.sh"})).await;
    assert_eq!(code, -32005);

    let code = rpc_error_code(&server.app, "run_script", json!({"script_name": "gone.sh"})).await;
    assert_eq!(code, -32013);
}

#[tokio::test]
async fn test_probe_without_configured_probe() {
    let server = test_server();
    let code = rpc_error_code(&server.app, "probe_service", json!({"service": "worker"})).await;
    assert_eq!(code, -32005);
}

#[tokio::test]
async fn test_health_check_unreachable_service() {
    let server = test_server();
    let result = rpc_result(&server.app, "probe_service", json!({"service": "idle"})).await;
    assert_eq!(result["kind"], "ollama");
    assert_eq!(result["running"], false);
    assert_eq!(result["models"], json!([]));
}

#[tokio::test]
async fn test_gpu_info_unavailable() {
    let server = test_server();
    let code = rpc_error_code(&server.app, "get_gpu_info", json!({})).await;
    assert_eq!(code, -32014);
}

#[tokio::test]
async fn test_missing_param_and_unknown_method() {
    let server = test_server();

    let code = rpc_error_code(&server.app, "start_service", json!({})).await;
    assert_eq!(code, -32005);

    let code = rpc_error_code(&server.app, "no_such_method", json!({})).await;
    assert_eq!(code, -32603);
}
