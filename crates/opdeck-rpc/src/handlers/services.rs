//! Configured service handlers.

use super::{require_str_param, with_controller};
use crate::server::AppState;
use opdeck_core::{ConsoleError, ToggleOutcome};
use serde_json::{json, Value};
use tracing::debug;

pub async fn list_services(state: &AppState, _params: &Value) -> opdeck_core::Result<Value> {
    let statuses = with_controller(state, |c| Ok(c.statuses())).await?;
    Ok(serde_json::to_value(statuses)?)
}

pub async fn get_service_status(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let service = require_str_param(params, "service", "service")?;
    let status = with_controller(state, move |c| c.status(&service)).await?;
    Ok(serde_json::to_value(status)?)
}

pub async fn is_service_running(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let service = require_str_param(params, "service", "service")?;
    let running = with_controller(state, move |c| c.is_running(&service)).await?;
    Ok(serde_json::to_value(running)?)
}

pub async fn get_service_gpu(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let service = require_str_param(params, "service", "service")?;
    let attribution = with_controller(state, move |c| c.attribute_gpu(&service)).await?;
    Ok(serde_json::to_value(attribution)?)
}

pub async fn start_service(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let service = require_str_param(params, "service", "service")?;
    with_controller(state, move |c| {
        let outcome = c.start(&service)?;
        let label = c.descriptor(&service)?.label();
        Ok(json!({
            "success": true,
            "message": format!("{} server started.", label),
            "pid": outcome.pid,
        }))
    })
    .await
}

pub async fn stop_service(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let service = require_str_param(params, "service", "service")?;
    with_controller(state, move |c| {
        let outcome = c.stop(&service)?;
        let label = c.descriptor(&service)?.label();
        Ok(json!({
            "success": true,
            "message": format!("{} server stopped.", label),
            "pid": outcome.pid,
        }))
    })
    .await
}

pub async fn toggle_service(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let service = require_str_param(params, "service", "service")?;
    let action = require_str_param(params, "action", "action")?;
    with_controller(state, move |c| {
        let outcome = c.toggle(&service, &action)?;
        let label = c.descriptor(&service)?.label();
        let message = match outcome {
            ToggleOutcome::Started(_) => format!("{} server started.", label),
            ToggleOutcome::Stopped(_) => format!("{} server stopped.", label),
        };
        Ok(json!({
            "success": true,
            "message": message,
            "outcome": outcome,
        }))
    })
    .await
}

pub async fn probe_service(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let service = require_str_param(params, "service", "service")?;
    let descriptor = state.controller.descriptor(&service)?;
    let Some(probe) = descriptor.probe.clone() else {
        return Err(ConsoleError::Validation {
            field: "service".to_string(),
            message: format!("{} has no health probe configured", descriptor.label()),
        });
    };
    let name = descriptor.name.clone();

    let report = opdeck_core::probe_service(&state.http, &name, &probe).await?;
    debug!("{} health check: running={}", name, report.running());
    Ok(serde_json::to_value(report)?)
}
