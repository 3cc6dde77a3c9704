//! Service lifecycle controller.
//!
//! A service is RUNNING when its match rule finds a witness in a fresh
//! snapshot and NOT_RUNNING otherwise; nothing about a service's state is
//! stored between calls. The state check before an action is advisory: the
//! action's own outcome (spawn error, signal error) is what gets reported.

use super::launcher::{LaunchOutcome, LaunchSpec, Launcher};
use super::matcher;
use super::scripts;
use super::snapshot::{ProcessTable, Snapshot};
use super::tree;
use crate::config::{ConsoleConfig, ServiceDescriptor};
use crate::error::{ConsoleError, Result};
use crate::platform::EXECUTABLE_SUFFIX;
use crate::system::{attribute, AcceleratorIndex, AttributionResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Requested transition for [`ServiceController::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Start,
    Stop,
}

impl ToggleAction {
    pub fn parse(action: &str) -> Result<Self> {
        match action {
            "start" => Ok(ToggleAction::Start),
            "stop" => Ok(ToggleAction::Stop),
            other => Err(ConsoleError::Validation {
                field: "action".to_string(),
                message: format!("invalid action: {}", other),
            }),
        }
    }
}

/// Everything the console knows about one service from a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub display_name: String,
    pub running: bool,
    pub witness_pid: Option<u32>,
    pub gpu: AttributionResult,
}

/// Result of a service stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StopOutcome {
    /// The process that was asked to exit.
    pub pid: u32,
}

/// Result of stopping every process with a given name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameStopOutcome {
    /// Processes that accepted the terminate request.
    pub signalled: Vec<u32>,
    /// Matching processes that could not be signalled.
    pub failed: Vec<u32>,
}

/// Start/stop/status for the configured services, applications and scripts.
pub struct ServiceController {
    config: Arc<ConsoleConfig>,
    table: Arc<dyn ProcessTable>,
    launcher: Arc<dyn Launcher>,
    accelerators: Arc<dyn AcceleratorIndex>,
}

impl ServiceController {
    pub fn new(
        config: Arc<ConsoleConfig>,
        table: Arc<dyn ProcessTable>,
        launcher: Arc<dyn Launcher>,
        accelerators: Arc<dyn AcceleratorIndex>,
    ) -> Self {
        Self {
            config,
            table,
            launcher,
            accelerators,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn accelerators(&self) -> &dyn AcceleratorIndex {
        self.accelerators.as_ref()
    }

    /// Look up a service descriptor.
    pub fn descriptor(&self, service: &str) -> Result<&ServiceDescriptor> {
        self.config
            .service(service)
            .ok_or_else(|| ConsoleError::UnknownService {
                name: service.to_string(),
            })
    }

    /// Whether the service has a witness process right now.
    pub fn is_running(&self, service: &str) -> Result<bool> {
        let descriptor = self.descriptor(service)?;
        let snapshot = self.table.snapshot();
        Ok(matcher::find(&snapshot, &descriptor.match_rule).is_some())
    }

    /// Which GPU the service computes on.
    ///
    /// Considers the trees under every matching process, not only the
    /// witness. Returns the sentinel when the service is not running or no
    /// accelerator information is available.
    pub fn attribute_gpu(&self, service: &str) -> Result<AttributionResult> {
        let descriptor = self.descriptor(service)?;
        let snapshot = self.table.snapshot();
        Ok(self.attribute_in(&snapshot, descriptor))
    }

    /// Running flag, witness and GPU attribution from one snapshot.
    pub fn status(&self, service: &str) -> Result<ServiceStatus> {
        let descriptor = self.descriptor(service)?;
        let snapshot = self.table.snapshot();
        Ok(self.status_in(&snapshot, descriptor))
    }

    /// Status of every configured service, in configuration order.
    pub fn statuses(&self) -> Vec<ServiceStatus> {
        let snapshot = self.table.snapshot();
        self.config
            .services
            .iter()
            .map(|descriptor| self.status_in(&snapshot, descriptor))
            .collect()
    }

    fn status_in(&self, snapshot: &Snapshot, descriptor: &ServiceDescriptor) -> ServiceStatus {
        let witness_pid = matcher::find(snapshot, &descriptor.match_rule).map(|r| r.pid);
        ServiceStatus {
            name: descriptor.name.clone(),
            display_name: descriptor.label().to_string(),
            running: witness_pid.is_some(),
            witness_pid,
            gpu: self.attribute_in(snapshot, descriptor),
        }
    }

    fn attribute_in(&self, snapshot: &Snapshot, descriptor: &ServiceDescriptor) -> AttributionResult {
        let roots: Vec<u32> = matcher::find_all(snapshot, &descriptor.match_rule)
            .iter()
            .map(|r| r.pid)
            .collect();
        if roots.is_empty() {
            return AttributionResult::none();
        }

        let devices = match self.accelerators.devices() {
            Ok(devices) => devices,
            Err(e) => {
                debug!("GPU attribution for {} skipped: {}", descriptor.name, e);
                return AttributionResult::none();
            }
        };

        let pids = tree::expand_all(snapshot, roots);
        attribute(&pids, &devices)
    }

    /// Start a service that is not running.
    ///
    /// Returns as soon as the process is spawned; a caller that needs to know
    /// the service came up must query again. Two starts racing before the
    /// first process shows up in the table can both launch; the second
    /// launch's own failure (e.g. a port already bound) is its outcome.
    pub fn start(&self, service: &str) -> Result<LaunchOutcome> {
        let descriptor = self.descriptor(service)?;
        let snapshot = self.table.snapshot();

        if let Some(witness) = matcher::find(&snapshot, &descriptor.match_rule) {
            debug!("{} already running as PID {}", descriptor.name, witness.pid);
            return Err(ConsoleError::AlreadyRunning {
                service: descriptor.label().to_string(),
            });
        }

        info!("Starting {}", descriptor.name);
        self.launcher
            .spawn_detached(descriptor.label(), &descriptor.launch)
    }

    /// Ask the service's witness process to exit.
    ///
    /// Only the witness is signalled; its children are expected to follow
    /// their supervisor.
    pub fn stop(&self, service: &str) -> Result<StopOutcome> {
        let descriptor = self.descriptor(service)?;
        let snapshot = self.table.snapshot();

        let Some(witness) = matcher::find(&snapshot, &descriptor.match_rule) else {
            return Err(ConsoleError::NotRunning {
                service: descriptor.label().to_string(),
            });
        };
        let pid = witness.pid;

        info!("Stopping {} (PID {})", descriptor.name, pid);
        match self.table.terminate(pid) {
            Ok(()) => Ok(StopOutcome { pid }),
            Err(e) => {
                warn!("Stopping {} (PID {}) failed: {}", descriptor.name, pid, e);
                Err(e)
            }
        }
    }

    /// Dispatch a start or stop request.
    pub fn toggle(&self, service: &str, action: &str) -> Result<ToggleOutcome> {
        match ToggleAction::parse(action)? {
            ToggleAction::Start => self.start(service).map(ToggleOutcome::Started),
            ToggleAction::Stop => self.stop(service).map(ToggleOutcome::Stopped),
        }
    }

    /// Start a whitelisted application by key.
    ///
    /// Keys outside the whitelist are refused before anything is launched.
    pub fn start_app(&self, key: &str) -> Result<LaunchOutcome> {
        let Some(app) = self.config.allowed_app(key) else {
            warn!("Refusing to start non-whitelisted application {:?}", key);
            return Err(ConsoleError::NotAllowed {
                key: key.to_string(),
            });
        };

        let spec = LaunchSpec {
            program: app.executable_path.clone(),
            args: app.args.clone(),
            cwd: None,
        };
        info!("Starting application {}", app.key);
        self.launcher.spawn_detached(&app.key, &spec)
    }

    /// Signal every process named `name` or `name.exe`, case-insensitively.
    ///
    /// Unlike [`stop`](Self::stop) this is not limited to configured services
    /// and hits every match, not just one.
    pub fn stop_app(&self, name: &str) -> Result<NameStopOutcome> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(ConsoleError::Validation {
                field: "app_name".to_string(),
                message: "application name not provided".to_string(),
            });
        }
        let wanted_exe = format!("{}{}", wanted, EXECUTABLE_SUFFIX);

        let snapshot = self.table.snapshot();
        let mut outcome = NameStopOutcome {
            signalled: Vec::new(),
            failed: Vec::new(),
        };

        for record in snapshot.iter() {
            let candidate = record.name.to_lowercase();
            if candidate != wanted && candidate != wanted_exe {
                continue;
            }
            match self.table.terminate(record.pid) {
                Ok(()) => outcome.signalled.push(record.pid),
                Err(e) => {
                    debug!("Could not signal {} (PID {}): {}", record.name, record.pid, e);
                    outcome.failed.push(record.pid);
                }
            }
        }

        if outcome.signalled.is_empty() {
            return Err(ConsoleError::NotFound {
                name: name.to_string(),
            });
        }

        info!(
            "Signalled {} process(es) named {}",
            outcome.signalled.len(),
            name
        );
        Ok(outcome)
    }

    /// Launch a script from the scripts directory.
    pub fn run_script(&self, file_name: &str) -> Result<LaunchOutcome> {
        let path = scripts::resolve_script(
            &self.config.scripts_dir,
            file_name,
            &self.config.script_extensions,
        )?;
        let spec = scripts::script_launch_spec(&path, &self.config.scripts_dir);

        info!("Running script {}", path.display());
        self.launcher.spawn_detached(file_name, &spec)
    }
}

/// What [`ServiceController::toggle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Started(LaunchOutcome),
    Stopped(StopOutcome),
}
