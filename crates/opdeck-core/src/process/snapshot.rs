//! Best-effort process table snapshots.
//!
//! A snapshot is the subset of live processes whose attributes could be read
//! at the moment of the scan. Processes that exit mid-scan or whose details
//! are hidden from us are dropped or left partially filled; a snapshot may
//! under-report but never reports a process that was not there.

use crate::error::Result;
use crate::platform;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use sysinfo::{
    ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, ThreadKind, UpdateKind, Users,
};
use tracing::debug;

/// One process as seen by a single snapshot.
///
/// Only meaningful relative to the snapshot that produced it; PIDs are reused
/// by the OS, so records are never kept across queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    /// Image name as reported by the OS.
    pub name: String,
    /// Command-line tokens; empty when unavailable.
    pub cmdline: Vec<String>,
    /// Owning user name; `None` when it could not be resolved.
    pub owner: Option<String>,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            parent_pid: None,
            name: name.into(),
            cmdline: Vec::new(),
            owner: None,
        }
    }

    pub fn with_parent(mut self, parent_pid: u32) -> Self {
        self.parent_pid = Some(parent_pid);
        self
    }

    pub fn with_cmdline<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmdline = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Point-in-time view of the process table, ordered by PID.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<ProcessRecord>,
}

impl Snapshot {
    pub fn new(mut records: Vec<ProcessRecord>) -> Self {
        records.sort_by_key(|r| r.pid);
        records.dedup_by_key(|r| r.pid);
        Self { records }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcessRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.records
            .binary_search_by_key(&pid, |r| r.pid)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Parent PID to child PIDs, in enumeration order.
    pub fn child_index(&self) -> HashMap<u32, Vec<u32>> {
        let mut index: HashMap<u32, Vec<u32>> = HashMap::new();
        for record in &self.records {
            if let Some(parent) = record.parent_pid {
                index.entry(parent).or_default().push(record.pid);
            }
        }
        index
    }
}

impl FromIterator<ProcessRecord> for Snapshot {
    fn from_iter<T: IntoIterator<Item = ProcessRecord>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a ProcessRecord;
    type IntoIter = std::slice::Iter<'a, ProcessRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// The OS process layer as the controller sees it.
///
/// Implementations must be safe to call from several threads at once; each
/// call stands alone.
pub trait ProcessTable: Send + Sync {
    /// Take a fresh snapshot. Never fails; unreadable processes are skipped.
    fn snapshot(&self) -> Snapshot;

    /// Ask `pid` to exit gracefully and return once the request is issued.
    fn terminate(&self, pid: u32) -> Result<()>;
}

/// Live process table backed by `sysinfo`.
pub struct SystemProcessTable {
    system: Mutex<System>,
    users: Mutex<Users>,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            users: Mutex::new(Users::new_with_refreshed_list()),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Snapshot {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new()
                .with_cmd(UpdateKind::Always)
                .with_user(UpdateKind::Always),
        );

        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.refresh_list();

        let mut skipped = 0usize;
        let records: Vec<ProcessRecord> = system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                // Linux lists each task of a process too; those are not processes
                if process.thread_kind() == Some(ThreadKind::Userland) {
                    return None;
                }

                // Exited between listing and inspection
                if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
                    skipped += 1;
                    return None;
                }

                let name = process.name().to_string_lossy().into_owned();
                if name.is_empty() {
                    skipped += 1;
                    return None;
                }

                let owner = process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|user| user.name().to_string());

                Some(ProcessRecord {
                    pid: pid.as_u32(),
                    parent_pid: process.parent().map(|p| p.as_u32()),
                    name,
                    cmdline: process
                        .cmd()
                        .iter()
                        .map(|token| token.to_string_lossy().into_owned())
                        .collect(),
                    owner,
                })
            })
            .collect();

        debug!(
            "snapshot: {} processes read, {} skipped",
            records.len(),
            skipped
        );

        Snapshot::new(records)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        platform::send_terminate(pid)
    }
}
