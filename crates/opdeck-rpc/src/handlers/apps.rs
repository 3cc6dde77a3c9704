//! Whitelisted application and script handlers.

use super::{require_str_param, with_controller};
use crate::server::AppState;
use serde_json::{json, Value};

pub async fn start_app(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let key = require_str_param(params, "app_name", "appName")?;
    with_controller(state, move |c| {
        let outcome = c.start_app(&key)?;
        Ok(json!({
            "success": true,
            "message": format!("Application \"{}\" started.", key),
            "pid": outcome.pid,
        }))
    })
    .await
}

pub async fn stop_app(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let name = require_str_param(params, "app_name", "appName")?;
    with_controller(state, move |c| {
        let outcome = c.stop_app(&name)?;
        Ok(json!({
            "success": true,
            "message": format!("Attempted to stop application \"{}\".", name),
            "signalled": outcome.signalled,
            "failed": outcome.failed,
        }))
    })
    .await
}

pub async fn run_script(state: &AppState, params: &Value) -> opdeck_core::Result<Value> {
    let script = require_str_param(params, "script_name", "scriptName")?;
    with_controller(state, move |c| {
        let outcome = c.run_script(&script)?;
        Ok(json!({
            "success": true,
            "message": format!("Script \"{}\" started.", script),
            "pid": outcome.pid,
        }))
    })
    .await
}
