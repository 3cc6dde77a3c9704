//! System-level readers and correlation.
//!
//! - `gpu` - Accelerator process index and GPU metrics (nvidia-smi)
//! - `attribution` - Mapping a service's process tree onto a device
//! - `resources` - CPU, RAM, temperatures and the running application list

mod attribution;
mod gpu;
mod resources;

pub use attribution::{attribute, AttributionResult};
pub use gpu::{
    create_accelerator_index, AcceleratorIndex, GpuDevice, GpuMetrics, NoOpAcceleratorIndex,
    NvidiaSmiIndex,
};
pub use resources::{RunningApp, SystemInfo, SystemMonitor};
