//! Detection of interactive CLI agents below a window's process.
//!
//! When the focused window is a terminal, the interesting context is often
//! the agent running inside it (claude, aider, ...). The detector walks the
//! process tree under the window's pid and reports the first known agent it
//! finds, together with that process's working directory.

use sysinfo::{Pid, System};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMatch {
    pub agent: String,
    pub working_dir: String,
}

pub struct AgentDetector {
    known_agents: Vec<String>,
}

impl AgentDetector {
    pub fn new(known_agents: Vec<String>) -> Self {
        Self { known_agents }
    }

    /// Search the process tree below `pid` for a known agent.
    ///
    /// Depth-first: each child is checked against the agent list before its
    /// own subtree is searched, siblings in order.
    pub fn detect(&self, pid: i32) -> Option<AgentMatch> {
        if pid <= 0 || self.known_agents.is_empty() {
            return None;
        }

        let mut sys = System::new();
        sys.refresh_processes();

        // sysinfo exposes parent links; invert them once per lookup.
        let mut children: std::collections::HashMap<Pid, Vec<Pid>> =
            std::collections::HashMap::new();
        for (pid, process) in sys.processes() {
            if let Some(parent) = process.parent() {
                children.entry(parent).or_default().push(*pid);
            }
        }

        self.search(&sys, &children, Pid::from_u32(pid as u32))
    }

    fn search(
        &self,
        sys: &System,
        children: &std::collections::HashMap<Pid, Vec<Pid>>,
        pid: Pid,
    ) -> Option<AgentMatch> {
        for &child in children.get(&pid).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(process) = sys.process(child) {
                let name = process.name();
                for agent in &self.known_agents {
                    if name.contains(agent.as_str()) {
                        return Some(AgentMatch {
                            agent: agent.clone(),
                            working_dir: process
                                .cwd()
                                .map(|p| p.display().to_string())
                                .unwrap_or_default(),
                        });
                    }
                }
            }

            // Recurse through shells and other intermediaries.
            if let Some(found) = self.search(sys, children, child) {
                return Some(found);
            }
        }
        None
    }
}
