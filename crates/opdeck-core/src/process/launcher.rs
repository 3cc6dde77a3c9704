//! Detached, fire-and-forget process launching.

use crate::error::{ConsoleError, Result};
use crate::platform;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// What to execute for a service, application or script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Executable name (resolved through `PATH`) or path.
    pub program: String,
    /// Arguments passed after the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; inherits the console's when unset.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }
}

/// A process that was handed to the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaunchOutcome {
    pub pid: u32,
}

/// Starts processes without waiting on them.
pub trait Launcher: Send + Sync {
    /// Spawn `spec` detached from the console and return immediately.
    ///
    /// `target` names what is being started, for error messages.
    ///
    /// # Errors
    /// - [`ConsoleError::LaunchNotFound`] if the executable cannot be located
    /// - [`ConsoleError::LaunchFailed`] for any other spawn failure
    fn spawn_detached(&self, target: &str, spec: &LaunchSpec) -> Result<LaunchOutcome>;
}

/// Launcher backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn spawn_detached(&self, target: &str, spec: &LaunchSpec) -> Result<LaunchOutcome> {
        if let Some(ref cwd) = spec.cwd {
            if !cwd.is_dir() {
                return Err(ConsoleError::LaunchFailed {
                    target: target.to_string(),
                    message: format!("working directory not found: {}", cwd.display()),
                });
            }
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(ref cwd) = spec.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        platform::detach_command(&mut cmd);

        debug!("Spawning {} {:?}", spec.program, spec.args);

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!("Executable for {} not found: {}", target, spec.program);
                return Err(ConsoleError::LaunchNotFound {
                    target: target.to_string(),
                    program: spec.program.clone(),
                });
            }
            Err(e) => {
                error!("Failed to spawn {}: {}", target, e);
                return Err(ConsoleError::LaunchFailed {
                    target: target.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let pid = child.id();
        info!("Launched {} with PID {}", target, pid);

        // Reap the child whenever it exits so it never lingers as a zombie.
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(LaunchOutcome { pid })
    }
}
