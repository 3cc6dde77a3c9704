//! Process tree expansion.
//!
//! GPU work usually runs in a child of the service's supervisor, so
//! attribution looks at the whole tree under each matched process.

use super::snapshot::Snapshot;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// A root process plus every transitive child seen at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceProcessSet {
    pub root_pid: u32,
    /// Always contains `root_pid`.
    pub member_pids: BTreeSet<u32>,
}

/// Collect `root_pid` and all of its descendants from `snapshot`.
///
/// A root that is no longer in the table yields just itself. Parent links that
/// loop back (PID reuse mid-scan) are visited once.
pub fn expand(snapshot: &Snapshot, root_pid: u32) -> ServiceProcessSet {
    let children = snapshot.child_index();

    let mut member_pids = BTreeSet::new();
    let mut queue = VecDeque::from([root_pid]);

    while let Some(pid) = queue.pop_front() {
        if !member_pids.insert(pid) {
            continue;
        }
        if let Some(kids) = children.get(&pid) {
            queue.extend(kids.iter().copied().filter(|k| !member_pids.contains(k)));
        }
    }

    ServiceProcessSet {
        root_pid,
        member_pids,
    }
}

/// Union of the trees under several roots.
pub fn expand_all(snapshot: &Snapshot, roots: impl IntoIterator<Item = u32>) -> HashSet<u32> {
    roots
        .into_iter()
        .flat_map(|root| expand(snapshot, root).member_pids)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessRecord;

    #[test]
    fn test_root_without_children() {
        let snapshot = Snapshot::new(vec![
            ProcessRecord::new(1, "init"),
            ProcessRecord::new(10, "server").with_parent(1),
        ]);

        let set = expand(&snapshot, 10);
        assert_eq!(set.root_pid, 10);
        assert_eq!(set.member_pids, BTreeSet::from([10]));
    }

    #[test]
    fn test_grandchildren_included() {
        let snapshot = Snapshot::new(vec![
            ProcessRecord::new(10, "server"),
            ProcessRecord::new(11, "child").with_parent(10),
            ProcessRecord::new(12, "grandchild").with_parent(11),
            ProcessRecord::new(99, "unrelated").with_parent(1),
        ]);

        let set = expand(&snapshot, 10);
        assert_eq!(set.member_pids, BTreeSet::from([10, 11, 12]));
        assert!(!set.member_pids.contains(&99));
    }

    #[test]
    fn test_vanished_root() {
        let snapshot = Snapshot::new(vec![ProcessRecord::new(1, "init")]);
        let set = expand(&snapshot, 4242);
        assert_eq!(set.member_pids, BTreeSet::from([4242]));
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let snapshot = Snapshot::new(vec![
            ProcessRecord::new(10, "a").with_parent(11),
            ProcessRecord::new(11, "b").with_parent(10),
        ]);

        let set = expand(&snapshot, 10);
        assert_eq!(set.member_pids, BTreeSet::from([10, 11]));
    }

    #[test]
    fn test_deep_chain() {
        let records: Vec<ProcessRecord> = (1..=5_000u32)
            .map(|pid| {
                let record = ProcessRecord::new(pid, "p");
                if pid > 1 {
                    record.with_parent(pid - 1)
                } else {
                    record
                }
            })
            .collect();
        let snapshot = Snapshot::new(records);

        assert_eq!(expand(&snapshot, 1).member_pids.len(), 5_000);
    }

    #[test]
    fn test_expand_all_unions_roots() {
        let snapshot = Snapshot::new(vec![
            ProcessRecord::new(10, "a"),
            ProcessRecord::new(11, "a-child").with_parent(10),
            ProcessRecord::new(20, "b"),
            ProcessRecord::new(21, "b-child").with_parent(20),
        ]);

        let all = expand_all(&snapshot, [10, 20]);
        assert_eq!(all, HashSet::from([10, 11, 20, 21]));
    }
}
