//! HTTP health probes for managed services.
//!
//! The process table says whether a service exists; a probe says whether it
//! answers and what it is doing. An unreachable endpoint is reported as not
//! running rather than as an error.

use crate::config::{HealthProbe, ProbeConfig};
use crate::error::{ConsoleError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Counters from an image-generation queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStatus {
    pub total: u64,
    pub completed: u64,
    pub in_progress: u64,
    pub pending: u64,
    pub failed: u64,
    pub canceled: u64,
}

/// What a probe learned about a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeReport {
    Ollama {
        running: bool,
        /// Models currently loaded, as returned by the server.
        models: Vec<Value>,
    },
    InvokeAi {
        running: bool,
        is_generating: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        queue: Option<QueueStatus>,
    },
}

impl ProbeReport {
    pub fn running(&self) -> bool {
        match self {
            ProbeReport::Ollama { running, .. } | ProbeReport::InvokeAi { running, .. } => {
                *running
            }
        }
    }
}

#[derive(Deserialize)]
struct QueueEnvelope {
    #[serde(default)]
    queue: QueueStatus,
}

/// Run `probe` against its service.
pub async fn probe_service(client: &Client, service: &str, probe: &HealthProbe) -> Result<ProbeReport> {
    match probe {
        HealthProbe::Ollama { base_url } => probe_ollama(client, service, base_url).await,
        HealthProbe::InvokeAi { base_url } => probe_invokeai(client, service, base_url).await,
    }
}

/// `None` when the endpoint cannot be reached at all.
async fn get(
    client: &Client,
    service: &str,
    url: &str,
    timeout: std::time::Duration,
) -> Result<Option<reqwest::Response>> {
    match client.get(url).timeout(timeout).send().await {
        Ok(response) => Ok(Some(response)),
        Err(e) if e.is_connect() || e.is_timeout() => {
            debug!("{} unreachable at {}: {}", service, url, e);
            Ok(None)
        }
        Err(e) => Err(probe_error(service, e)),
    }
}

async fn probe_ollama(client: &Client, service: &str, base_url: &str) -> Result<ProbeReport> {
    let base = base_url.trim_end_matches('/');
    let not_running = ProbeReport::Ollama {
        running: false,
        models: Vec::new(),
    };

    let Some(response) = get(client, service, &format!("{}/", base), ProbeConfig::LIVENESS_TIMEOUT).await?
    else {
        return Ok(not_running);
    };
    if response.status() != StatusCode::OK {
        return Ok(not_running);
    }
    let banner = response.text().await.map_err(|e| probe_error(service, e))?;
    if !banner.contains("Ollama is running") {
        return Ok(not_running);
    }

    let Some(response) = get(client, service, &format!("{}/api/ps", base), ProbeConfig::DETAIL_TIMEOUT).await?
    else {
        return Ok(not_running);
    };
    let body: Value = response.json().await.map_err(|e| probe_error(service, e))?;
    let models = body
        .get("models")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(ProbeReport::Ollama {
        running: true,
        models,
    })
}

async fn probe_invokeai(client: &Client, service: &str, base_url: &str) -> Result<ProbeReport> {
    let base = base_url.trim_end_matches('/');
    let not_running = ProbeReport::InvokeAi {
        running: false,
        is_generating: false,
        queue: None,
    };

    let version_url = format!("{}/api/v1/app/version", base);
    let Some(response) = get(client, service, &version_url, ProbeConfig::LIVENESS_TIMEOUT).await?
    else {
        return Ok(not_running);
    };
    if response.status() != StatusCode::OK {
        return Ok(not_running);
    }

    let queue_url = format!("{}/api/v1/queue/default/status", base);
    let queue = match get(client, service, &queue_url, ProbeConfig::LIVENESS_TIMEOUT).await? {
        Some(response) if response.status() == StatusCode::OK => {
            let envelope: QueueEnvelope =
                response.json().await.map_err(|e| probe_error(service, e))?;
            Some(envelope.queue)
        }
        // Up, but the queue cannot be read: assume idle
        _ => None,
    };

    Ok(ProbeReport::InvokeAi {
        running: true,
        is_generating: queue.as_ref().is_some_and(|q| q.in_progress > 0),
        queue,
    })
}

fn probe_error(service: &str, err: reqwest::Error) -> ConsoleError {
    ConsoleError::Probe {
        service: service.to_string(),
        message: err.to_string(),
    }
}
