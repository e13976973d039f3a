//! Actions on queued messages.
//!
//! Every action runs `exim <flag> <ids...>` and checks that each output line
//! carries the confirmation Exim prints for a successful change. Actions
//! block until Exim exits.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::exim::command::ToolSettings;

/// Result of an action: whether it applied everywhere, and what to tell the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// State-changing actions on queued messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Remove,
    Freeze,
    Thaw,
    Deliver,
    GiveUp,
    AddRecipients,
    EditSender,
    MarkAllDelivered,
}

impl Action {
    /// Exim command-line flag.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Remove => "-Mrm",
            Self::Freeze => "-Mf",
            Self::Thaw => "-Mt",
            Self::Deliver => "-M",
            Self::GiveUp => "-Mg",
            Self::AddRecipients => "-Mar",
            Self::EditSender => "-Mes",
            Self::MarkAllDelivered => "-Mmad",
        }
    }

    /// Text every output line must contain. `None`: the output is reported as-is.
    pub fn expected(self) -> Option<&'static str> {
        match self {
            Self::Remove => Some("has been removed"),
            Self::Freeze => Some("is now frozen"),
            Self::Thaw => Some("is no longer frozen"),
            Self::Deliver | Self::GiveUp => None,
            Self::AddRecipients | Self::EditSender | Self::MarkAllDelivered => {
                Some("has been modified")
            }
        }
    }

    /// Past participle used in success reports.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Remove => "removed",
            Self::Freeze => "frozen",
            Self::Thaw => "thawed",
            Self::Deliver => "delivered",
            Self::GiveUp => "given up",
            Self::AddRecipients | Self::EditSender => "modified",
            Self::MarkAllDelivered => "marked as delivered",
        }
    }

    /// Short label for menus and confirmations.
    pub fn label(self) -> &'static str {
        match self {
            Self::Remove => "Remove",
            Self::Freeze => "Freeze",
            Self::Thaw => "Thaw",
            Self::Deliver => "Force delivery",
            Self::GiveUp => "Give up",
            Self::AddRecipients => "Add recipients",
            Self::EditSender => "Edit sender",
            Self::MarkAllDelivered => "Mark all recipients as delivered",
        }
    }
}

/// Check that every line of `output` contains `expected`.
///
/// On success the report reads `2 messages have been frozen.`; on failure it
/// is the offending lines joined with newlines.
pub fn check_output(output: &str, expected: &str, msg_count: usize, verb: &str) -> ActionOutcome {
    let errors: Vec<&str> = output
        .lines()
        .filter(|line| !line.contains(expected))
        .collect();
    if errors.is_empty() {
        let words = if msg_count > 1 {
            "messages have"
        } else {
            "message has"
        };
        ActionOutcome::ok(format!("{msg_count} {words} been {verb}."))
    } else {
        ActionOutcome::failed(errors.join("\n"))
    }
}

/// Runs message actions and queries against one Exim installation.
#[derive(Debug, Clone)]
pub struct QueueActions {
    settings: ToolSettings,
}

impl QueueActions {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ToolSettings) {
        self.settings = settings;
    }

    fn exim<S: AsRef<str>>(&self, args: &[S]) -> String {
        self.settings.exim().arg_list(args).output_text()
    }

    /// Apply `action` to every id in `ids` with optional trailing arguments.
    fn apply(&self, action: Action, ids: &[String], extra: &[&str]) -> ActionOutcome {
        if ids.is_empty() {
            return ActionOutcome::failed("No messages selected.");
        }
        let mut args: Vec<&str> = vec![action.flag()];
        args.extend(ids.iter().map(String::as_str));
        args.extend_from_slice(extra);

        info!(action = action.label(), count = ids.len(), "Running queue action");
        let output = self.exim(args.as_slice());
        match action.expected() {
            Some(expected) => check_output(&output, expected, ids.len(), action.verb()),
            None => ActionOutcome::ok(output),
        }
    }

    /// Run a multi-message action by kind. Single-message edits need their
    /// own arguments and are not accepted here.
    pub fn run(&self, action: Action, ids: &[String]) -> ActionOutcome {
        match action {
            Action::Remove => self.remove(ids),
            Action::Freeze => self.freeze(ids),
            Action::Thaw => self.thaw(ids),
            Action::Deliver => self.deliver(ids),
            Action::GiveUp => self.give_up(ids),
            Action::MarkAllDelivered => self.mark_all_delivered(ids),
            Action::AddRecipients | Action::EditSender => {
                ActionOutcome::failed(format!("{} needs extra input.", action.label()))
            }
        }
    }

    pub fn remove(&self, ids: &[String]) -> ActionOutcome {
        self.apply(Action::Remove, ids, &[])
    }

    pub fn freeze(&self, ids: &[String]) -> ActionOutcome {
        self.apply(Action::Freeze, ids, &[])
    }

    pub fn thaw(&self, ids: &[String]) -> ActionOutcome {
        self.apply(Action::Thaw, ids, &[])
    }

    /// Force a delivery attempt; Exim's delivery report is returned as-is.
    pub fn deliver(&self, ids: &[String]) -> ActionOutcome {
        self.apply(Action::Deliver, ids, &[])
    }

    /// Stop trying to deliver; bounces are generated by Exim.
    pub fn give_up(&self, ids: &[String]) -> ActionOutcome {
        self.apply(Action::GiveUp, ids, &[])
    }

    /// Add whitespace-separated `recipients` to one message.
    pub fn add_recipients(&self, id: &str, recipients: &str) -> ActionOutcome {
        let recipients: Vec<&str> = recipients.split_whitespace().collect();
        if recipients.is_empty() {
            return ActionOutcome::failed("No recipients given.");
        }
        self.apply(Action::AddRecipients, &[id.to_string()], &recipients)
    }

    /// Replace the envelope sender of one message.
    pub fn edit_sender(&self, id: &str, sender: &str) -> ActionOutcome {
        let sender = sender.trim();
        if sender.is_empty() {
            return ActionOutcome::failed("No sender given.");
        }
        self.apply(Action::EditSender, &[id.to_string()], &[sender])
    }

    pub fn mark_all_delivered(&self, ids: &[String]) -> ActionOutcome {
        self.apply(Action::MarkAllDelivered, ids, &[])
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Message body (`-Mvb`).
    pub fn message_body(&self, id: &str) -> String {
        self.exim(&["-Mvb", id])
    }

    /// Message headers (`-Mvh`).
    pub fn message_headers(&self, id: &str) -> String {
        self.exim(&["-Mvh", id])
    }

    /// Per-message delivery log (`-Mvl`).
    pub fn message_log(&self, id: &str) -> String {
        self.exim(&["-Mvl", id])
    }

    /// Every Exim configuration option (`-bP`).
    pub fn configuration(&self) -> String {
        self.exim(&["-bP"])
    }

    /// Start a queue runner in the background (`-q`).
    pub fn run_queue(&self) -> Result<String> {
        self.settings.exim().args("-q").spawn_detached()?;
        info!("Spawned a queue runner");
        Ok("Spawning a queue runner in the background.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_output_all_lines_match() {
        let output = "Message 1AttSk-0002qB-00 has been removed\nMessage 1AttSl-0002qC-00 has been removed";
        let outcome = check_output(output, "has been removed", 2, "removed");
        assert_eq!(outcome, ActionOutcome::ok("2 messages have been removed."));
    }

    #[test]
    fn test_check_output_singular() {
        let outcome = check_output("Message x is now frozen", "is now frozen", 1, "frozen");
        assert_eq!(outcome.message, "1 message has been frozen.");
    }

    #[test]
    fn test_check_output_reports_offending_lines() {
        let output = "Message a is now frozen\nMessage b is not on the queue\nexim: permission denied";
        let outcome = check_output(output, "is now frozen", 2, "frozen");
        assert!(!outcome.success);
        assert_eq!(
            outcome.message,
            "Message b is not on the queue\nexim: permission denied"
        );
    }

    #[test]
    fn test_action_table() {
        assert_eq!(Action::Remove.flag(), "-Mrm");
        assert_eq!(Action::Thaw.expected(), Some("is no longer frozen"));
        assert_eq!(Action::Deliver.expected(), None);
        assert_eq!(Action::MarkAllDelivered.verb(), "marked as delivered");
    }

    #[test]
    fn test_empty_selection_does_not_invoke_exim() {
        let actions = QueueActions::new(ToolSettings {
            bin_dir: "/nonexistent".into(),
            ..ToolSettings::default()
        });
        let outcome = actions.freeze(&[]);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "No messages selected.");
        assert!(!actions.add_recipients("id", "   ").success);
        assert!(!actions.edit_sender("id", "").success);
    }
}
