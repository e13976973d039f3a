//! Exim process collector (`exiwhat`).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::Result;
use crate::exim::command::ToolSettings;
use crate::exim::refresher::Refresher;
use crate::model::process::{count_summary, ProcessSnapshot};

/// Name of the process-activity tool.
pub const EXIWHAT: &str = "exiwhat";

/// Callback receiving each completed process snapshot.
pub type ProcessCallback = Box<dyn Fn(ProcessSnapshot) + Send + Sync>;

/// Parse one `<pid> <status>` line.
fn parse_line(line: &str) -> Option<(u32, String)> {
    let line = line.trim_start();
    let (pid, info) = line.split_once(char::is_whitespace)?;
    let info = info.trim();
    if info.is_empty() {
        return None;
    }
    Some((pid.parse().ok()?, info.to_string()))
}

/// Turn raw `exiwhat` output into a snapshot.
pub fn parse_output(output: &str) -> ProcessSnapshot {
    let mut processes = BTreeMap::new();

    let summary = if output.contains("Permission denied") || output.contains("Operation not permitted")
    {
        "Permission problems!".to_string()
    } else if output.contains("No exim process data") {
        "No exim processes are currently running.".to_string()
    } else if output.is_empty() {
        "No output from exiwhat!".to_string()
    } else {
        let mut error = None;
        for line in output.lines() {
            match parse_line(line) {
                Some((pid, info)) => {
                    processes.insert(pid, info);
                }
                None => {
                    debug!(line = %line, "Unparseable exiwhat line");
                    error = Some(format!("Error processing exiwhat output line: {line}"));
                }
            }
        }
        error.unwrap_or_else(|| count_summary(processes.len()))
    };

    ProcessSnapshot { processes, summary }
}

/// Run one `exiwhat` cycle synchronously.
pub fn collect(settings: &ToolSettings) -> ProcessSnapshot {
    let output = settings.command(EXIWHAT).output_text();
    parse_output(&output)
}

struct ProcessState {
    settings: RwLock<ToolSettings>,
    snapshot: RwLock<Arc<ProcessSnapshot>>,
    callback: ProcessCallback,
}

impl ProcessState {
    fn refresh(&self) {
        let settings = self
            .settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let snapshot = collect(&settings);
        debug!(processes = snapshot.len(), summary = %snapshot.summary, "Processes refreshed");
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot.clone());
        (self.callback)(snapshot);
    }
}

/// Keeps a process snapshot fresh on a background worker.
pub struct ProcessCollector {
    state: Arc<ProcessState>,
    refresher: Refresher,
}

impl ProcessCollector {
    /// Start the worker. `callback` runs on the worker after each cycle.
    pub fn new<F>(settings: ToolSettings, callback: F) -> Result<Self>
    where
        F: Fn(ProcessSnapshot) + Send + Sync + 'static,
    {
        let state = Arc::new(ProcessState {
            settings: RwLock::new(settings),
            snapshot: RwLock::new(Arc::new(ProcessSnapshot::default())),
            callback: Box::new(callback),
        });
        let worker_state = Arc::clone(&state);
        let refresher = Refresher::spawn("exim-processes", move || worker_state.refresh())?;
        Ok(Self { state, refresher })
    }

    /// Request a refresh; returns immediately.
    pub fn refresh(&self) {
        self.refresher.schedule();
    }

    /// Most recently published snapshot.
    pub fn snapshot(&self) -> Arc<ProcessSnapshot> {
        Arc::clone(&self.state.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Replace the invocation settings; the cycle in flight keeps the old ones.
    pub fn set_settings(&self, settings: ToolSettings) {
        *self.state.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    /// Stop the worker (best effort, bounded wait).
    pub fn stop(&mut self) -> bool {
        self.refresher.stop()
    }
}
