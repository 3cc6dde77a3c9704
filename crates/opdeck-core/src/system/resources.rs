//! Host telemetry: CPU, RAM, temperatures and the running application list.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use sysinfo::{
    Components, ProcessRefreshKind, ProcessesToUpdate, System, ThreadKind, UpdateKind, Users,
};

/// Host-wide resource usage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemInfo {
    /// CPU usage percentage (0-100).
    pub cpu_usage: f32,
    /// RAM usage percentage (0-100).
    pub ram_usage: f32,
    /// Sensor label to Celsius. Empty where the platform exposes no sensors.
    pub temperatures: BTreeMap<String, f32>,
}

/// A process with enough identity to be shown to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct RunningApp {
    pub pid: u32,
    pub name: String,
    pub username: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// Telemetry reader holding the `sysinfo` state between calls.
pub struct SystemMonitor {
    system: Mutex<System>,
    /// When CPU counters were last sampled; `None` before the first sample.
    last_cpu_sample: Mutex<Option<Instant>>,
}

impl SystemMonitor {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            last_cpu_sample: Mutex::new(None),
        }
    }

    /// CPU usage is measured against the previous sample, so the first call
    /// samples twice with the minimum interval in between.
    fn sample_cpu(&self, system: &mut System) {
        let mut last = self
            .last_cpu_sample
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.is_none() {
            system.refresh_cpu_usage();
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        }
        system.refresh_cpu_usage();
        *last = Some(Instant::now());
    }

    /// CPU, RAM and temperature readings.
    pub fn system_info(&self) -> SystemInfo {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        self.sample_cpu(&mut system);
        system.refresh_memory();

        let ram_usage = percent(system.used_memory(), system.total_memory());

        let components = Components::new_with_refreshed_list();
        let temperatures = components
            .list()
            .iter()
            .filter_map(|component| {
                let celsius = component.temperature();
                celsius
                    .is_finite()
                    .then(|| (component.label().to_string(), celsius))
            })
            .collect();

        SystemInfo {
            cpu_usage: system.global_cpu_usage(),
            ram_usage,
            temperatures,
        }
    }

    /// Processes that have both a name and a resolvable owner.
    pub fn running_apps(&self) -> Vec<RunningApp> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new()
                .with_cpu()
                .with_memory()
                .with_user(UpdateKind::OnlyIfNotSet),
        );

        let users = Users::new_with_refreshed_list();
        let total_memory = system.total_memory();

        let mut apps: Vec<RunningApp> = system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                if process.thread_kind() == Some(ThreadKind::Userland) {
                    return None;
                }
                let name = process.name().to_string_lossy().into_owned();
                if name.is_empty() {
                    return None;
                }
                let username = process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|user| user.name().to_string())?;

                Some(RunningApp {
                    pid: pid.as_u32(),
                    name,
                    username,
                    cpu_percent: process.cpu_usage(),
                    memory_percent: percent(process.memory(), total_memory),
                })
            })
            .collect();

        apps.sort_by_key(|app| app.pid);
        apps
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(part: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((part as f64 / total as f64) * 100.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(50, 200), 25.0);
    }

    #[test]
    fn test_system_info() {
        let monitor = SystemMonitor::default();
        let info = monitor.system_info();

        assert!(info.cpu_usage >= 0.0);
        assert!(info.ram_usage > 0.0 && info.ram_usage <= 100.0);
    }

    #[test]
    fn test_running_apps_sorted() {
        let monitor = SystemMonitor::default();
        let apps = monitor.running_apps();

        assert!(apps.windows(2).all(|w| w[0].pid < w[1].pid));
        assert!(apps.iter().all(|a| !a.name.is_empty() && !a.username.is_empty()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_running_apps_skips_threads() {
        use std::sync::mpsc;

        let (tid_tx, tid_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            tid_tx.send(nix::unistd::gettid().as_raw() as u32).unwrap();
            let _ = done_rx.recv();
        });
        let tid = tid_rx.recv().unwrap();

        let apps = SystemMonitor::default().running_apps();
        done_tx.send(()).unwrap();
        worker.join().unwrap();

        assert!(apps.iter().all(|a| a.pid != tid));
    }
}
