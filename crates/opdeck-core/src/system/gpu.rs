//! Accelerator process index.
//!
//! Lists GPUs and the PIDs holding compute contexts on each, via nvidia-smi.
//! Availability is probed once when the index is created; a host without the
//! driver gets an index that reports `AcceleratorUnavailable` on every call.

use crate::error::{ConsoleError, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::process::Command;
use tracing::{debug, warn};

/// One accelerator and the processes currently computing on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
    pub uuid: String,
    pub compute_pids: HashSet<u32>,
}

/// Point-in-time health metrics for one accelerator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpuMetrics {
    pub index: u32,
    pub name: String,
    /// Celsius.
    pub temperature: Option<f32>,
    /// Percent of maximum fan speed.
    pub fan_speed: Option<f32>,
    /// Bytes.
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_free: u64,
    /// Percent.
    pub utilization_gpu: Option<f32>,
    pub utilization_mem: Option<f32>,
}

/// Source of per-device compute PIDs.
pub trait AcceleratorIndex: Send + Sync {
    /// Whether the management tool initialised.
    fn is_available(&self) -> bool;

    /// Devices in index order, each with its compute PIDs.
    fn devices(&self) -> Result<Vec<GpuDevice>>;

    /// Temperature, fan, memory and utilization per device.
    fn metrics(&self) -> Result<Vec<GpuMetrics>>;
}

/// NVIDIA accelerator index using nvidia-smi.
pub struct NvidiaSmiIndex {
    available: bool,
}

impl NvidiaSmiIndex {
    /// Probe nvidia-smi once; the result holds for the life of the index.
    pub fn new() -> Self {
        let available = Command::new("nvidia-smi")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        if !available {
            warn!("nvidia-smi not available - GPU attribution disabled");
        }

        Self { available }
    }

    fn query(&self, args: &[&str]) -> Result<String> {
        if !self.available {
            return Err(ConsoleError::AcceleratorUnavailable);
        }

        let output = Command::new("nvidia-smi")
            .args(args)
            .output()
            .map_err(|e| ConsoleError::Other(format!("Failed to run nvidia-smi: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("nvidia-smi returned non-zero: {}", stderr);
            return Err(ConsoleError::Other(format!(
                "nvidia-smi failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for NvidiaSmiIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceleratorIndex for NvidiaSmiIndex {
    fn is_available(&self) -> bool {
        self.available
    }

    fn devices(&self) -> Result<Vec<GpuDevice>> {
        let gpus = self.query(&["--query-gpu=index,uuid,name", "--format=csv,noheader"])?;
        let apps = self.query(&[
            "--query-compute-apps=gpu_uuid,pid",
            "--format=csv,noheader",
        ])?;
        Ok(parse_devices(&gpus, &apps))
    }

    fn metrics(&self) -> Result<Vec<GpuMetrics>> {
        let output = self.query(&[
            "--query-gpu=index,temperature.gpu,fan.speed,memory.total,memory.used,memory.free,utilization.gpu,utilization.memory,name",
            "--format=csv,noheader,nounits",
        ])?;
        Ok(parse_metrics(&output))
    }
}

/// Index for hosts without a supported accelerator.
pub struct NoOpAcceleratorIndex;

impl AcceleratorIndex for NoOpAcceleratorIndex {
    fn is_available(&self) -> bool {
        false
    }

    fn devices(&self) -> Result<Vec<GpuDevice>> {
        Err(ConsoleError::AcceleratorUnavailable)
    }

    fn metrics(&self) -> Result<Vec<GpuMetrics>> {
        Err(ConsoleError::AcceleratorUnavailable)
    }
}

/// Create the appropriate accelerator index for the current system.
pub fn create_accelerator_index() -> Box<dyn AcceleratorIndex> {
    let nvidia = NvidiaSmiIndex::new();
    if nvidia.is_available() {
        Box::new(nvidia)
    } else {
        Box::new(NoOpAcceleratorIndex)
    }
}

/// Join `index, uuid, name` rows with `gpu_uuid, pid` rows.
fn parse_devices(gpu_csv: &str, apps_csv: &str) -> Vec<GpuDevice> {
    let mut pids_by_uuid: HashMap<&str, HashSet<u32>> = HashMap::new();
    for line in apps_csv.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut parts = line.splitn(2, ',').map(str::trim);
        if let (Some(uuid), Some(pid)) = (parts.next(), parts.next()) {
            if let Ok(pid) = pid.parse::<u32>() {
                pids_by_uuid.entry(uuid).or_default().insert(pid);
            }
        }
    }

    let mut devices: Vec<GpuDevice> = gpu_csv
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(3, ',').map(str::trim);
            let index = parts.next()?.parse::<u32>().ok()?;
            let uuid = parts.next()?.to_string();
            let name = parts.next().unwrap_or("").to_string();
            let compute_pids = pids_by_uuid.remove(uuid.as_str()).unwrap_or_default();
            Some(GpuDevice {
                index,
                name,
                uuid,
                compute_pids,
            })
        })
        .collect();

    devices.sort_by_key(|d| d.index);
    devices
}

fn parse_metrics(csv: &str) -> Vec<GpuMetrics> {
    const MIB: u64 = 1024 * 1024;

    let number = |s: &str| s.parse::<f32>().ok();
    let mib = |s: &str| s.parse::<u64>().map(|v| v * MIB).unwrap_or(0);

    let mut metrics: Vec<GpuMetrics> = csv
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            // Name goes last so commas in it cannot shift the numeric columns
            let parts: Vec<&str> = line.splitn(9, ',').map(str::trim).collect();
            if parts.len() < 9 {
                debug!("Unexpected nvidia-smi output format: {}", line);
                return None;
            }
            Some(GpuMetrics {
                index: parts[0].parse().ok()?,
                temperature: number(parts[1]),
                fan_speed: number(parts[2]),
                memory_total: mib(parts[3]),
                memory_used: mib(parts[4]),
                memory_free: mib(parts[5]),
                utilization_gpu: number(parts[6]),
                utilization_mem: number(parts[7]),
                name: parts[8].to_string(),
            })
        })
        .collect();

    metrics.sort_by_key(|m| m.index);
    metrics
}
