//! Attributing accelerator usage to a logical service.

use super::gpu::GpuDevice;
use serde::Serialize;
use std::collections::HashSet;

/// Which device, if any, a service is computing on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributionResult {
    /// `-1` when the service has no compute context on any device.
    pub gpu_index: i32,
    /// Empty when `gpu_index` is `-1`.
    pub gpu_name: String,
}

impl AttributionResult {
    pub const NONE_INDEX: i32 = -1;

    pub fn none() -> Self {
        Self {
            gpu_index: Self::NONE_INDEX,
            gpu_name: String::new(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.gpu_index == Self::NONE_INDEX
    }
}

impl Default for AttributionResult {
    fn default() -> Self {
        Self::none()
    }
}

/// First device, in the order given, with a compute PID inside `pids`.
///
/// A service spread over several devices is reported on the first one only.
pub fn attribute(pids: &HashSet<u32>, devices: &[GpuDevice]) -> AttributionResult {
    devices
        .iter()
        .find(|device| !device.compute_pids.is_disjoint(pids))
        .map(|device| AttributionResult {
            gpu_index: i32::try_from(device.index).unwrap_or(AttributionResult::NONE_INDEX),
            gpu_name: device.name.clone(),
        })
        .unwrap_or_else(AttributionResult::none)
}
