//! Global application state for the TUI (the "Model" in Elm architecture).
//!
//! The collectors run on their own workers and hand finished snapshots to
//! the UI thread through a channel; everything in [`App`] is only touched
//! from the UI thread.

use std::collections::{BTreeSet, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::exim::actions::{Action, ActionOutcome, QueueActions};
use crate::exim::process::ProcessCollector;
use crate::exim::queue::QueueCollector;
use crate::exim::tailer::LogTailer;
use crate::model::message::{Message, QueueSnapshot};
use crate::model::process::ProcessSnapshot;
use crate::stats::ActivityMeter;

/// Upper bound of the log pane; older lines are dropped in bulk.
pub const MAX_LOG_LINES: usize = 10_000;
/// Share of [`MAX_LOG_LINES`] kept after trimming, in percent.
const LOG_KEEP_PERCENT: usize = 80;
/// Seconds a transient status message stays visible.
const STATUS_TIMEOUT_SECS: u64 = 5;

/// Which panel currently has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Log,
    Queue,
}

/// Column used for sorting the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    Sender,
    Size,
    Age,
}

impl SortColumn {
    pub fn next(self) -> Self {
        match self {
            Self::Id => Self::Sender,
            Self::Sender => Self::Size,
            Self::Size => Self::Age,
            Self::Age => Self::Id,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::Sender => "Sender",
            Self::Size => "Size",
            Self::Age => "Age",
        }
    }
}

/// Read-only queries whose output is shown in a text popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Body,
    Headers,
    MessageLog,
    Configuration,
}

/// Popup currently covering the main view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    Help,
    Processes,
    Confirm { action: Action, ids: Vec<String> },
    Input { action: Action, id: String, buffer: String },
    Text { title: String, body: String, scroll: u16 },
}

/// Messages sent from worker threads to the UI thread.
#[derive(Debug)]
pub enum UiEvent {
    Queue(QueueSnapshot),
    Processes(ProcessSnapshot),
    Outcome { action: Action, outcome: ActionOutcome },
    Text { title: String, body: String },
}

/// Fires once per interval when polled.
#[derive(Debug)]
struct Timer {
    interval: Duration,
    last: Instant,
}

impl Timer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    fn due(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// Complete TUI state.
pub struct App {
    pub config: Config,

    // ── Sources ───────────────────────────────
    tailer: LogTailer,
    queue: QueueCollector,
    processes: ProcessCollector,
    actions: QueueActions,
    pub meter: ActivityMeter,
    sender: Sender<UiEvent>,
    events: Receiver<UiEvent>,

    // ── Log pane ──────────────────────────────
    pub log_lines: VecDeque<String>,
    /// Lines scrolled back from the newest one (0 = bottom).
    pub log_scroll: usize,
    /// Cached viewport height for the log (set during render).
    pub log_viewport_height: usize,

    // ── Queue pane ────────────────────────────
    pub queue_snapshot: QueueSnapshot,
    /// Message ids in display order.
    pub queue_ids: Vec<String>,
    pub selected: usize,
    pub queue_scroll_offset: usize,
    /// Cached viewport height for the queue (set during render).
    pub queue_viewport_height: usize,
    pub marked: BTreeSet<String>,
    pub sort_column: SortColumn,
    pub sort_ascending: bool,

    pub process_snapshot: ProcessSnapshot,

    // ── UI state ──────────────────────────────
    pub focus: Focus,
    pub popup: Option<Popup>,
    /// Number of actions still running in the background.
    pub actions_running: usize,
    pub should_quit: bool,
    /// Transient status message and the instant it was set.
    pub status_message: Option<(String, Instant)>,

    log_timer: Timer,
    queue_timer: Timer,
    process_timer: Timer,
    plot_timer: Timer,
}

impl App {
    /// Start the collectors and attach to the main log.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let (sender, events) = mpsc::channel();
        let settings = config.paths.tool_settings();

        let queue_tx = sender.clone();
        let queue = QueueCollector::new(settings.clone(), move |snapshot| {
            let _ = queue_tx.send(UiEvent::Queue(snapshot));
        })?;
        let process_tx = sender.clone();
        let processes = ProcessCollector::new(settings.clone(), move |snapshot| {
            let _ = process_tx.send(UiEvent::Processes(snapshot));
        })?;

        let tailer = LogTailer::new(
            config.paths.log_dir.clone(),
            config.paths.mainlog_name.clone(),
            settings.clone(),
        );
        info!(path = %tailer.path().display(), "Monitoring Exim");

        let timers = &config.timers;
        let mut app = Self {
            tailer,
            queue,
            processes,
            actions: QueueActions::new(settings),
            meter: ActivityMeter::new(timers.plotting()),
            sender,
            events,
            log_lines: VecDeque::new(),
            log_scroll: 0,
            log_viewport_height: 10,
            queue_snapshot: QueueSnapshot::default(),
            queue_ids: Vec::new(),
            selected: 0,
            queue_scroll_offset: 0,
            queue_viewport_height: 10,
            marked: BTreeSet::new(),
            sort_column: SortColumn::Age,
            sort_ascending: false,
            process_snapshot: ProcessSnapshot::default(),
            focus: Focus::Queue,
            popup: None,
            actions_running: 0,
            should_quit: false,
            status_message: None,
            log_timer: Timer::new(timers.log()),
            queue_timer: Timer::new(timers.queue()),
            process_timer: Timer::new(timers.process()),
            plot_timer: Timer::new(timers.plotting()),
            config,
        };

        app.push_log_lines(vec![format!(
            "{} eximshell {} started",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            env!("CARGO_PKG_VERSION")
        )]);
        app.queue.refresh();
        if app.config.display.show_process_list {
            app.popup = Some(Popup::Processes);
            app.processes.refresh();
        }
        Ok(app)
    }

    // ── Periodic work ─────────────────────────

    /// Called every tick: applies worker results and fires due timers.
    pub fn tick(&mut self) {
        if let Some((_, when)) = &self.status_message {
            if when.elapsed().as_secs() >= STATUS_TIMEOUT_SECS {
                self.status_message = None;
            }
        }

        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }

        let now = Instant::now();
        if self.log_timer.due(now) {
            self.tailer.update();
            let lines = self.tailer.get_unseen();
            self.push_log_lines(lines);
        }
        if self.queue_timer.due(now) {
            self.queue.refresh();
        }
        if self.process_timer.due(now) && self.popup == Some(Popup::Processes) {
            self.processes.refresh();
        }
        if self.plot_timer.due(now) {
            let lines = self.tailer.get_for_processing();
            self.meter.sample(&lines, self.queue_ids.len());
        }
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Queue(snapshot) => self.apply_queue_snapshot(snapshot),
            UiEvent::Processes(snapshot) => self.process_snapshot = snapshot,
            UiEvent::Outcome { action, outcome } => {
                self.actions_running = self.actions_running.saturating_sub(1);
                self.report_outcome(action, outcome);
                self.queue.refresh();
            }
            UiEvent::Text { title, body } => self.show_text(title, body),
        }
    }

    fn report_outcome(&mut self, action: Action, outcome: ActionOutcome) {
        if !outcome.success {
            warn!(action = action.label(), message = %outcome.message, "Queue action failed");
            self.show_text(format!("{} failed", action.label()), outcome.message);
        } else if self.config.popups.report_success {
            if outcome.message.contains('\n') {
                self.show_text(action.label().to_string(), outcome.message);
            } else {
                self.set_status(&outcome.message);
            }
        }
    }

    // ── Log pane ──────────────────────────────

    /// Append lines to the log pane, trimming it when it grows too large.
    pub fn push_log_lines(&mut self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let added = lines.len();
        self.log_lines.extend(lines);
        if self.log_lines.len() > MAX_LOG_LINES {
            let keep = MAX_LOG_LINES * LOG_KEEP_PERCENT / 100;
            let excess = self.log_lines.len() - keep;
            self.log_lines.drain(..excess);
        }
        if !self.config.display.track_log || self.log_scroll > 0 {
            self.log_scroll += added;
        }
        self.clamp_log_scroll();
    }

    pub fn scroll_log_up(&mut self, lines: usize) {
        self.log_scroll += lines;
        self.clamp_log_scroll();
    }

    pub fn scroll_log_down(&mut self, lines: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(lines);
    }

    fn clamp_log_scroll(&mut self) {
        let max = self
            .log_lines
            .len()
            .saturating_sub(self.log_viewport_height.max(1));
        self.log_scroll = self.log_scroll.min(max);
    }

    // ── Queue pane ────────────────────────────

    /// Install a new queue snapshot, keeping the selection on the same message.
    pub fn apply_queue_snapshot(&mut self, snapshot: QueueSnapshot) {
        let current = self.current_id().map(str::to_string);
        self.queue_snapshot = snapshot;
        self.marked
            .retain(|id| self.queue_snapshot.messages.contains_key(id));
        self.apply_sort();
        self.selected = current
            .and_then(|id| self.queue_ids.iter().position(|i| *i == id))
            .unwrap_or(self.selected)
            .min(self.queue_ids.len().saturating_sub(1));
        self.ensure_selected_visible();
    }

    /// Sort `queue_ids` according to the active column and direction.
    pub fn apply_sort(&mut self) {
        let snapshot = &self.queue_snapshot;
        self.queue_ids = if snapshot.error_text().is_some() {
            Vec::new()
        } else {
            snapshot.messages.keys().cloned().collect()
        };

        let col = self.sort_column;
        let asc = self.sort_ascending;
        self.queue_ids.sort_by(|a, b| {
            let (ma, mb) = (&snapshot.messages[a], &snapshot.messages[b]);
            let cmp = compare(col, ma, mb);
            if asc {
                cmp
            } else {
                cmp.reverse()
            }
        });
    }

    /// Change the sort column (toggles direction if the column is unchanged).
    pub fn sort_by(&mut self, column: SortColumn) {
        if self.sort_column == column {
            self.sort_ascending = !self.sort_ascending;
        } else {
            self.sort_column = column;
            self.sort_ascending = matches!(column, SortColumn::Id | SortColumn::Sender);
        }
        self.apply_sort();
    }

    /// Id of the message under the cursor.
    pub fn current_id(&self) -> Option<&str> {
        self.queue_ids.get(self.selected).map(String::as_str)
    }

    pub fn current_message(&self) -> Option<&Message> {
        self.current_id().and_then(|id| self.queue_snapshot.get(id))
    }

    pub fn select(&mut self, index: usize) {
        if index < self.queue_ids.len() {
            self.selected = index;
            self.ensure_selected_visible();
        }
    }

    pub fn toggle_mark(&mut self) {
        if let Some(id) = self.current_id().map(str::to_string) {
            if !self.marked.remove(&id) {
                self.marked.insert(id);
            }
        }
    }

    /// Mark every message, or clear all marks if everything is marked.
    pub fn toggle_mark_all(&mut self) {
        if self.marked.len() == self.queue_ids.len() {
            self.marked.clear();
        } else {
            self.marked.extend(self.queue_ids.iter().cloned());
        }
    }

    /// Marked messages, or the message under the cursor if none are marked.
    pub fn target_ids(&self) -> Vec<String> {
        if self.marked.is_empty() {
            self.current_id().map(str::to_string).into_iter().collect()
        } else {
            self.marked.iter().cloned().collect()
        }
    }

    /// Ensure the selected row is visible given the current scroll offset.
    pub fn ensure_selected_visible(&mut self) {
        let vp = self.queue_viewport_height.max(1);
        if self.selected < self.queue_scroll_offset {
            self.queue_scroll_offset = self.selected;
        } else if self.selected >= self.queue_scroll_offset + vp {
            self.queue_scroll_offset = self.selected.saturating_sub(vp - 1);
        }
    }

    // ── Actions ───────────────────────────────

    /// Start `action` on the target messages, asking first if configured to.
    pub fn request_action(&mut self, action: Action) {
        let ids = self.target_ids();
        if ids.is_empty() {
            self.set_status("No messages selected.");
            return;
        }
        match action {
            Action::AddRecipients | Action::EditSender => {
                let Some(id) = self.current_id().map(str::to_string) else {
                    return;
                };
                self.popup = Some(Popup::Input {
                    action,
                    id,
                    buffer: String::new(),
                });
            }
            _ if self.config.popups.confirm_actions => {
                self.popup = Some(Popup::Confirm { action, ids });
            }
            _ => self.run_action(action, ids, String::new()),
        }
    }

    /// Run `action` on a background thread; the outcome arrives as an event.
    pub fn run_action(&mut self, action: Action, ids: Vec<String>, input: String) {
        let actions = self.actions.clone();
        let tx = self.sender.clone();
        let spawned = thread::Builder::new()
            .name("exim-action".to_string())
            .spawn(move || {
                let outcome = match (action, ids.first()) {
                    (Action::AddRecipients, Some(id)) => actions.add_recipients(id, &input),
                    (Action::EditSender, Some(id)) => actions.edit_sender(id, &input),
                    _ => actions.run(action, &ids),
                };
                let _ = tx.send(UiEvent::Outcome { action, outcome });
            });
        match spawned {
            Ok(_) => {
                self.actions_running += 1;
                self.marked.clear();
                self.set_status(&format!("{}...", action.label()));
            }
            Err(e) => {
                warn!(error = %e, "Failed to start action thread");
                self.set_status(&format!("Could not start action: {e}"));
            }
        }
    }

    /// Fetch a message detail or the Exim configuration in the background.
    pub fn run_query(&mut self, query: Query) {
        let id = match query {
            Query::Configuration => String::new(),
            _ => match self.current_id() {
                Some(id) => id.to_string(),
                None => {
                    self.set_status("No message selected.");
                    return;
                }
            },
        };
        let actions = self.actions.clone();
        let tx = self.sender.clone();
        let spawned = thread::Builder::new()
            .name("exim-query".to_string())
            .spawn(move || {
                let (title, body) = match query {
                    Query::Body => (format!("Body of {id}"), actions.message_body(&id)),
                    Query::Headers => (format!("Headers of {id}"), actions.message_headers(&id)),
                    Query::MessageLog => (format!("Log of {id}"), actions.message_log(&id)),
                    Query::Configuration => ("Exim configuration".to_string(), actions.configuration()),
                };
                let _ = tx.send(UiEvent::Text { title, body });
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start query thread");
            self.set_status(&format!("Could not start query: {e}"));
        }
    }

    /// Start a queue runner in the background.
    pub fn run_queue(&mut self) {
        match self.actions.run_queue() {
            Ok(msg) => self.set_status(&msg),
            Err(e) => self.show_text("Queue runner failed".to_string(), e.to_string()),
        }
    }

    // ── Toggles ───────────────────────────────

    pub fn toggle_processes(&mut self) {
        if self.popup == Some(Popup::Processes) {
            self.popup = None;
        } else {
            self.popup = Some(Popup::Processes);
            self.processes.refresh();
        }
    }

    pub fn toggle_plotter(&mut self) {
        self.config.display.show_plotter = !self.config.display.show_plotter;
    }

    pub fn toggle_track_log(&mut self) {
        let display = &mut self.config.display;
        display.track_log = !display.track_log;
        if display.track_log {
            self.log_scroll = 0;
            self.set_status("Following the log");
        } else {
            self.set_status("Log scrolling paused");
        }
    }

    pub fn toggle_statusbar(&mut self) {
        self.config.display.show_statusbar = !self.config.display.show_statusbar;
    }

    /// Write the current settings (display toggles included) to disk.
    pub fn save_settings(&mut self) {
        match config::save_config(&self.config) {
            Ok(()) => self.set_status("Settings saved"),
            Err(e) => self.set_status(&format!("Could not save settings: {e}")),
        }
    }

    // ── Misc ──────────────────────────────────

    pub fn show_text(&mut self, title: String, body: String) {
        self.popup = Some(Popup::Text {
            title,
            body,
            scroll: 0,
        });
    }

    /// Set a transient status message that auto-clears after a few seconds.
    pub fn set_status(&mut self, msg: &str) {
        self.status_message = Some((msg.to_string(), Instant::now()));
    }

    /// Whether the main log is currently followed.
    pub fn log_attached(&self) -> bool {
        self.tailer.is_attached()
    }

    pub fn location(&self) -> String {
        let paths = &self.config.paths;
        if paths.use_ssh {
            paths.hostname.clone()
        } else {
            "localhost".to_string()
        }
    }

    /// Stop the collector workers; called once on exit.
    pub fn shutdown(&mut self) {
        if !self.queue.stop() {
            warn!("Queue worker did not stop in time");
        }
        if !self.processes.stop() {
            warn!("Process worker did not stop in time");
        }
    }
}

fn compare(column: SortColumn, a: &Message, b: &Message) -> std::cmp::Ordering {
    match column {
        SortColumn::Id => a.id.cmp(&b.id),
        SortColumn::Sender => a.sender.to_lowercase().cmp(&b.sender.to_lowercase()),
        SortColumn::Size => a.size_bytes().total_cmp(&b.size_bytes()),
        SortColumn::Age => a.age_minutes().total_cmp(&b.age_minutes()),
    }
}
