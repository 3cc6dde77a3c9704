//! Process lifecycle management.
//!
//! Handles detection, tree expansion, launching and stopping of configured
//! services (Ollama, InvokeAI, ...) and whitelisted applications.
//!
//! # Detection Strategy
//!
//! Nothing is remembered between calls. Every query takes a fresh
//! [`Snapshot`] of the process table and looks for a *witness*: the first
//! process, in PID order, that satisfies the service's [`MatchRule`]. Child
//! processes are found from the same snapshot's parent links, so a service's
//! tree and the witness always come from one consistent view.
//!
//! # Example
//!
//! ```rust,no_run
//! use opdeck_core::config::ConsoleConfig;
//! use opdeck_core::process::{ProcessLauncher, ServiceController, SystemProcessTable};
//! use opdeck_core::system::NvidiaSmiIndex;
//! use std::sync::Arc;
//!
//! fn main() -> opdeck_core::Result<()> {
//!     let controller = ServiceController::new(
//!         Arc::new(ConsoleConfig::default()),
//!         Arc::new(SystemProcessTable::new()),
//!         Arc::new(ProcessLauncher),
//!         Arc::new(NvidiaSmiIndex::new()),
//!     );
//!
//!     let status = controller.status("ollama")?;
//!     println!("running: {}, gpu: {}", status.running, status.gpu.gpu_index);
//!     Ok(())
//! }
//! ```

mod controller;
mod launcher;
mod matcher;
mod scripts;
mod snapshot;
mod tree;

pub use controller::{
    NameStopOutcome, ServiceController, ServiceStatus, StopOutcome, ToggleAction, ToggleOutcome,
};
pub use launcher::{LaunchOutcome, LaunchSpec, Launcher, ProcessLauncher};
pub use matcher::{find, find_all, MatchRule};
pub use scripts::{resolve_script, script_launch_spec};
pub use snapshot::{ProcessRecord, ProcessTable, Snapshot, SystemProcessTable};
pub use tree::{expand, expand_all, ServiceProcessSet};
