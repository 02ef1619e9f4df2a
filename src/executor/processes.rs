//! Cleanup of child processes still alive at shutdown

use crate::logging::Logger;
use std::collections::{HashMap, HashSet, VecDeque};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// All descendants of `root` (children, grandchildren, ...) excluding
/// threads, in breadth-first order
pub fn descendants_of(system: &System, root: Pid) -> Vec<Pid> {
    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, process) in system.processes() {
        if process.thread_kind().is_some() {
            continue;
        }
        if let Some(parent) = process.parent() {
            if parent != *pid {
                children.entry(parent).or_default().push(*pid);
            }
        }
    }

    walk_tree(&children, root)
}

/// Level-order walk of a parent -> children map, skipping cycles
fn walk_tree(children: &HashMap<Pid, Vec<Pid>>, root: Pid) -> Vec<Pid> {
    let mut found = Vec::new();
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(pid) = queue.pop_front() {
        for child in children.get(&pid).into_iter().flatten() {
            if seen.insert(*child) {
                found.push(*child);
                queue.push_back(*child);
            }
        }
    }
    found
}

/// Kill every live descendant of `root`, logging each one. Returns the PIDs
/// that were signalled.
pub async fn terminate_descendants(root: Pid, logger: Option<&Logger>) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut terminated = Vec::new();
    for pid in descendants_of(&system, root) {
        let Some(process) = system.process(pid) else {
            continue;
        };
        if let Some(logger) = logger {
            logger
                .info(&format!("Terminating child process: {}", pid.as_u32()))
                .field("pid", pid.as_u32())
                .log()
                .await;
        }
        if process.kill() {
            terminated.push(pid.as_u32());
        } else if let Some(logger) = logger {
            logger
                .warn(&format!("Could not terminate child process {}", pid.as_u32()))
                .log()
                .await;
        }
    }
    terminated
}

/// Kill every child process of this process
pub async fn terminate_child_processes(logger: Option<&Logger>) -> Vec<u32> {
    terminate_descendants(Pid::from_u32(std::process::id()), logger).await
}

#[cfg(test)]
mod walk_tests {
    use super::*;

    fn pid(n: u32) -> Pid {
        Pid::from_u32(n)
    }

    #[test]
    fn test_walk_is_level_order() {
        // 1 -> {2, 3}; 3 -> 30 -> 300; 2 -> 20
        let children = HashMap::from([
            (pid(1), vec![pid(2), pid(3)]),
            (pid(3), vec![pid(30)]),
            (pid(30), vec![pid(300)]),
            (pid(2), vec![pid(20)]),
        ]);

        assert_eq!(walk_tree(&children, pid(1)), vec![pid(2), pid(3), pid(20), pid(30), pid(300)]);
        assert_eq!(walk_tree(&children, pid(3)), vec![pid(30), pid(300)]);
        assert!(walk_tree(&children, pid(300)).is_empty());
    }

    #[test]
    fn test_walk_survives_cycles() {
        let children = HashMap::from([(pid(1), vec![pid(2)]), (pid(2), vec![pid(1), pid(3)])]);
        assert_eq!(walk_tree(&children, pid(1)), vec![pid(2), pid(3)]);
    }
}
