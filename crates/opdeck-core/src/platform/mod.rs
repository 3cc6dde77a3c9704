//! Platform abstraction layer for cross-platform compatibility.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than in the
//! process and launcher modules.
//!
//! - `process` - Signal delivery and child detachment

pub mod process;

pub use process::{detach_command, send_terminate};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}

/// Suffix the OS appends to executable image names.
///
/// Generic stop-by-name matches both `name` and `name` plus this suffix, so
/// the suffix is the Windows one regardless of the host.
pub const EXECUTABLE_SUFFIX: &str = ".exe";
