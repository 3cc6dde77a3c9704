//! opdeck Core - Headless library for the workstation operator console.
//!
//! Decides whether configured services are running, which GPU they compute
//! on, and starts or stops them. It can be used programmatically without any
//! HTTP/RPC layer; see the `opdeck-rpc` crate for the JSON-RPC server.
//!
//! # Example
//!
//! ```rust,ignore
//! use opdeck_core::{ConsoleConfig, ServiceController};
//!
//! fn main() -> opdeck_core::Result<()> {
//!     let controller = opdeck_core::default_controller(ConsoleConfig::load_or_default(None)?);
//!
//!     for status in controller.statuses() {
//!         println!("{}: running={} gpu={}", status.name, status.running, status.gpu.gpu_index);
//!     }
//!
//!     controller.start("ollama")?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod platform;
pub mod probe;
pub mod process;
pub mod system;

// Re-export commonly used types
pub use config::{AllowedApplication, ConsoleConfig, HealthProbe, ServiceDescriptor};
pub use error::{ConsoleError, Result};
pub use probe::{probe_service, ProbeReport, QueueStatus};
pub use process::{
    LaunchOutcome, LaunchSpec, MatchRule, NameStopOutcome, ProcessRecord, ServiceController,
    ServiceStatus, Snapshot, StopOutcome, ToggleOutcome,
};
pub use system::{AttributionResult, GpuDevice, GpuMetrics, RunningApp, SystemInfo, SystemMonitor};

use std::sync::Arc;

/// Build a controller backed by the live process table, detached process
/// launcher and nvidia-smi.
pub fn default_controller(config: ConsoleConfig) -> ServiceController {
    ServiceController::new(
        Arc::new(config),
        Arc::new(process::SystemProcessTable::new()),
        Arc::new(process::ProcessLauncher),
        Arc::from(system::create_accelerator_index()),
    )
}
