//! Platform-specific process control.
//!
//! Graceful termination only: the console never force-kills. Callers get the
//! OS verdict back as a structured error so a refused or late signal can be
//! reported instead of guessed.

use crate::error::{ConsoleError, Result};
use std::process::Command;
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Ask a process to exit without forcing it.
///
/// Returns once the signal is issued; does not wait for the exit.
///
/// # Platform Behavior
/// - **Linux/macOS**: `SIGTERM`
/// - **Windows**: `taskkill /PID {pid}` without `/F`
///
/// # Errors
/// - [`ConsoleError::ProcessVanished`] if the process no longer exists
/// - [`ConsoleError::PermissionDenied`] if the OS refuses delivery
pub fn send_terminate(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        send_terminate_unix(pid)
    }

    #[cfg(windows)]
    {
        send_terminate_windows(pid)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        Err(ConsoleError::Other(
            "Process termination not implemented for this platform".into(),
        ))
    }
}

#[cfg(unix)]
fn send_terminate_unix(pid: u32) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| ConsoleError::ProcessVanished { pid })?;

    debug!("Sending SIGTERM to process {}", pid);
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(ConsoleError::ProcessVanished { pid }),
        Err(Errno::EPERM) => {
            warn!("SIGTERM to {} refused by the OS", pid);
            Err(ConsoleError::PermissionDenied { pid })
        }
        Err(e) => Err(ConsoleError::Other(format!(
            "Failed to signal process {}: {}",
            pid, e
        ))),
    }
}

#[cfg(windows)]
fn send_terminate_windows(pid: u32) -> Result<()> {
    debug!("Requesting close of process {} with taskkill", pid);

    let output = Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .output()
        .map_err(|e| ConsoleError::Other(format!("Failed to run taskkill: {}", e)))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
    if stderr.contains("not found") || stderr.contains("not running") {
        Err(ConsoleError::ProcessVanished { pid })
    } else if stderr.contains("access is denied") {
        warn!("taskkill refused for {}", pid);
        Err(ConsoleError::PermissionDenied { pid })
    } else {
        Err(ConsoleError::Other(format!(
            "taskkill failed for {}: {}",
            pid,
            stderr.trim()
        )))
    }
}

/// Detach a command from the console so it outlives it and is reaped by init.
///
/// # Platform Behavior
/// - **Linux/macOS**: the child calls `setsid()` and becomes a session leader
/// - **Windows**: `CREATE_NEW_PROCESS_GROUP`
#[allow(unsafe_code)]
pub fn detach_command(cmd: &mut Command) {
    #[cfg(unix)]
    {
        // SAFETY: setsid() is async-signal-safe and touches no state shared
        // with the parent between fork and exec.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = cmd;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminate_nonexistent_is_vanished() {
        let result = send_terminate(4_000_000_000);
        assert!(matches!(result, Err(ConsoleError::ProcessVanished { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_detached_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        detach_command(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let pid = child.id();

        assert!(send_terminate(pid).is_ok());
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
