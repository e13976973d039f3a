//! Exim queue collector (`exim -bpr`).
//!
//! The listing looks like this, one block per message:
//!
//! ```text
//! 25m  2.9K 1AttSk-0002qB-00 <alice@example.org>
//!           bob@example.net
//!           carol@example.net
//!
//! 22h  1.2K 1AttSl-0002qC-00 <> *** frozen ***
//!           postmaster@example.org
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::Result;
use crate::exim::command::ToolSettings;
use crate::exim::refresher::Refresher;
use crate::model::message::{InvalidStatusLine, Message, QueueSnapshot};

/// Exim flag producing the queue listing.
pub const LIST_FLAG: &str = "-bpr";

/// Output fragments meaning the listing could not be produced at all.
const INVOCATION_ERRORS: [&str; 2] = ["No such file or directory", " not found"];

/// Callback receiving each completed queue snapshot.
pub type QueueCallback = Box<dyn Fn(QueueSnapshot) + Send + Sync>;

/// Recognise output that is an invocation error rather than a listing.
pub fn is_invocation_error(output: &str) -> bool {
    INVOCATION_ERRORS.iter().any(|e| output.contains(e))
        || output.to_lowercase().contains("permission denied")
}

/// Split a listing into per-message results.
///
/// A status line starts a message, following non-blank lines are its
/// recipients and a blank line closes it. Status lines with too few fields
/// come back as `Err` and the scan keeps looking for the next status line.
pub fn parse_listing(text: &str) -> Vec<std::result::Result<Message, InvalidStatusLine>> {
    let mut records = Vec::new();
    let mut current: Option<Message> = None;

    for line in text.lines() {
        let blank = line.trim().is_empty();
        match current.as_mut() {
            Some(message) if !blank => message.add_recipient(line),
            Some(_) => records.extend(current.take().map(Ok)),
            None if blank => {}
            None => match Message::from_status_line(line) {
                Ok(message) => current = Some(message),
                Err(e) => {
                    debug!(line = %line, "Skipping odd status line");
                    records.push(Err(e));
                }
            },
        }
    }
    records.extend(current.map(Ok));
    records
}

/// Turn raw `exim -bpr` output into a snapshot.
pub fn parse_output(output: &str) -> QueueSnapshot {
    if is_invocation_error(output) {
        return QueueSnapshot::error(format!("Error invoking `exim {LIST_FLAG}`:\n{output}"));
    }
    let mut snapshot = QueueSnapshot::default();
    for message in parse_listing(output).into_iter().flatten() {
        snapshot.messages.insert(message.id.clone(), message);
    }
    snapshot
}

/// Run one listing cycle synchronously.
pub fn collect(settings: &ToolSettings) -> QueueSnapshot {
    let output = settings.exim().args(LIST_FLAG).output_text();
    parse_output(&output)
}

struct QueueState {
    settings: RwLock<ToolSettings>,
    snapshot: RwLock<Arc<QueueSnapshot>>,
    /// Message count of the last successful listing.
    queue_length: AtomicUsize,
    callback: QueueCallback,
}

impl QueueState {
    fn refresh(&self) {
        let settings = self
            .settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let snapshot = collect(&settings);
        debug!(messages = snapshot.len(), "Queue refreshed");
        if snapshot.error_text().is_none() {
            self.queue_length.store(snapshot.len(), Ordering::Relaxed);
        }
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot.clone());
        (self.callback)(snapshot);
    }
}

/// Keeps a queue snapshot fresh on a background worker.
pub struct QueueCollector {
    state: Arc<QueueState>,
    refresher: Refresher,
}

impl QueueCollector {
    /// Start the worker. `callback` runs on the worker after each cycle.
    pub fn new<F>(settings: ToolSettings, callback: F) -> Result<Self>
    where
        F: Fn(QueueSnapshot) + Send + Sync + 'static,
    {
        let state = Arc::new(QueueState {
            settings: RwLock::new(settings),
            snapshot: RwLock::new(Arc::new(QueueSnapshot::default())),
            queue_length: AtomicUsize::new(0),
            callback: Box::new(callback),
        });
        let worker_state = Arc::clone(&state);
        let refresher = Refresher::spawn("exim-queue", move || worker_state.refresh())?;
        Ok(Self { state, refresher })
    }

    /// Request a refresh; returns immediately.
    pub fn refresh(&self) {
        self.refresher.schedule();
    }

    /// Most recently published snapshot.
    pub fn snapshot(&self) -> Arc<QueueSnapshot> {
        Arc::clone(&self.state.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Number of messages found by the last successful listing. A cycle
    /// that ends in an invocation error leaves it unchanged.
    pub fn queue_length(&self) -> usize {
        self.state.queue_length.load(Ordering::Relaxed)
    }

    pub fn settings(&self) -> ToolSettings {
        self.state
            .settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the invocation settings; the cycle in flight keeps the old ones.
    pub fn set_settings(&self, settings: ToolSettings) {
        *self.state.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    /// Whether a refresh is running right now.
    pub fn is_busy(&self) -> bool {
        self.refresher.is_busy()
    }

    /// Stop the worker (best effort, bounded wait).
    pub fn stop(&mut self) -> bool {
        self.refresher.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::ERROR_KEY;

    #[test]
    fn test_single_frozen_message() {
        let snapshot = parse_output("22h  1.2K 1AttSk-0002qB-00 <> *** frozen ***\n\n");
        assert_eq!(snapshot.len(), 1);
        let m = snapshot.get("1AttSk-0002qB-00").unwrap();
        assert!(m.frozen);
        assert_eq!(m.age, "22h");
        assert_eq!(m.size, "1.2K");
        assert_eq!(m.sender, "<>");
        assert!(m.recipients.is_empty());
    }

    #[test]
    fn test_recipients_accumulate_until_blank_line() {
        let listing = "25m  2.9K 1AttSk-0002qB-00 <alice@example.org>\n          bob@example.net\n   D carol@example.net\n\n 3h   512 1AttSl-0002qC-00 <dave@example.org>\n          erin@example.net\n";
        let snapshot = parse_output(listing);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get("1AttSk-0002qB-00").unwrap().recipients,
            vec!["bob@example.net".to_string(), "D carol@example.net".to_string()]
        );
        assert_eq!(
            snapshot.get("1AttSl-0002qC-00").unwrap().recipients,
            vec!["erin@example.net".to_string()]
        );
    }

    #[test]
    fn test_invalid_status_line_is_skipped() {
        let listing = "25m  2.9K 1AttSk-0002qB-00 <alice@example.org>\n          bob@example.net\n\ngarbage line\n\n 3h   512 1AttSl-0002qC-00 <dave@example.org>\n          erin@example.net\n";
        let records = parse_listing(listing);
        assert_eq!(records.iter().filter(|r| r.is_err()).count(), 1);

        let snapshot = parse_output(listing);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("1AttSk-0002qB-00").is_some());
        assert!(snapshot.get("1AttSl-0002qC-00").is_some());
    }

    #[test]
    fn test_permission_denied_short_circuits() {
        let output = "exim: permission denied\n25m  2.9K 1AttSk-0002qB-00 <alice@example.org>";
        let snapshot = parse_output(output);
        assert_eq!(snapshot.len(), 1);
        let sentinel = snapshot.get(ERROR_KEY).unwrap();
        assert_eq!(sentinel.recipients.len(), 1);
        assert!(sentinel.recipients[0].starts_with("Error invoking `exim -bpr`:\n"));
        assert!(sentinel.recipients[0].ends_with(output));
    }

    #[test]
    fn test_missing_binary_short_circuits() {
        for output in [
            "sh: 1: /usr/sbin/exim: not found",
            "sh: /usr/sbin/exim: No such file or directory",
        ] {
            let snapshot = parse_output(output);
            assert!(snapshot.error_text().is_some(), "{output}");
        }
    }

    #[test]
    fn test_empty_queue() {
        let snapshot = parse_output("");
        assert!(snapshot.is_empty());
        assert!(snapshot.error_text().is_none());
    }
}
