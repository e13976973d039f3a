//! Exim process list built from `exiwhat` output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of one process refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Status text reported by `exiwhat`, keyed by process id.
    pub processes: BTreeMap<u32, String>,
    /// Human-readable summary: a process count or the problem encountered.
    pub summary: String,
}

impl ProcessSnapshot {
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// Summary sentence for a successfully parsed list.
pub fn count_summary(count: usize) -> String {
    let word = if count > 1 { "processes" } else { "process" };
    format!("{count} exim {word}.")
}
