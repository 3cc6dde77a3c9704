//! System telemetry handlers.

use super::with_controller;
use crate::server::AppState;
use opdeck_core::ConsoleError;
use serde_json::Value;
use std::sync::Arc;

pub async fn get_system_info(state: &AppState, _params: &Value) -> opdeck_core::Result<Value> {
    let monitor = Arc::clone(&state.monitor);
    let info = tokio::task::spawn_blocking(move || monitor.system_info())
        .await
        .map_err(|e| ConsoleError::Other(format!("System info task failed: {}", e)))?;
    Ok(serde_json::to_value(info)?)
}

pub async fn get_gpu_info(state: &AppState, _params: &Value) -> opdeck_core::Result<Value> {
    let metrics = with_controller(state, |c| c.accelerators().metrics()).await?;
    Ok(serde_json::to_value(metrics)?)
}

pub async fn get_running_apps(state: &AppState, _params: &Value) -> opdeck_core::Result<Value> {
    let monitor = Arc::clone(&state.monitor);
    let apps = tokio::task::spawn_blocking(move || monitor.running_apps())
        .await
        .map_err(|e| ConsoleError::Other(format!("Process list task failed: {}", e)))?;
    Ok(serde_json::to_value(apps)?)
}
