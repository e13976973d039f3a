//! Queued message records and the queue snapshot built from `exim -bpr`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key under which an invocation failure is reported in a [`QueueSnapshot`].
pub const ERROR_KEY: &str = "error";

/// A status line that could not be turned into a [`Message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid status line: {0}")]
pub struct InvalidStatusLine(pub String);

/// One message waiting in the Exim queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Exim message id, e.g. `1AttSk-0002qB-00`.
    pub id: String,
    /// Time spent in the queue, as printed by Exim (`22h`, `3d`).
    pub age: String,
    /// Message size, as printed by Exim (`1.2K`, `3M`, `812`).
    pub size: String,
    /// Envelope sender; `<>` for bounces.
    pub sender: String,
    /// Frozen messages are not retried automatically.
    pub frozen: bool,
    /// Recipients still pending, in listing order.
    pub recipients: Vec<String>,
}

impl Message {
    /// Parse a queue status line such as
    /// `22h  1.2K 1AttSk-0002qB-00 <> *** frozen ***`.
    pub fn from_status_line(line: &str) -> Result<Self, InvalidStatusLine> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(InvalidStatusLine(line.to_string()));
        }
        Ok(Self {
            id: parts[2].to_string(),
            age: parts[0].to_string(),
            size: parts[1].to_string(),
            sender: parts[3].to_string(),
            frozen: parts[4..].contains(&"frozen"),
            recipients: Vec::new(),
        })
    }

    /// Placeholder record carrying an invocation error as its only recipient.
    pub fn error_sentinel(text: impl Into<String>) -> Self {
        Self {
            id: ERROR_KEY.to_string(),
            age: "-".to_string(),
            size: "-".to_string(),
            sender: "-".to_string(),
            frozen: true,
            recipients: vec![text.into()],
        }
    }

    /// Append a recipient line, trimming surrounding whitespace.
    pub fn add_recipient(&mut self, line: &str) {
        self.recipients.push(line.trim().to_string());
    }

    /// Whether this record is the invocation-error placeholder.
    pub fn is_error(&self) -> bool {
        self.id == ERROR_KEY && self.age == "-"
    }

    /// Size in bytes (`K` and `M` suffixes are binary multiples).
    pub fn size_bytes(&self) -> f64 {
        eval_suffix(&self.size, &[('K', 1024.0), ('M', 1024.0 * 1024.0)])
    }

    /// Age in minutes (`m`, `h` and `d` suffixes).
    pub fn age_minutes(&self) -> f64 {
        eval_suffix(&self.age, &[('m', 1.0), ('h', 60.0), ('d', 24.0 * 60.0)])
    }
}

/// Evaluate a number with an optional unit suffix; unparseable tokens count as zero.
fn eval_suffix(token: &str, units: &[(char, f64)]) -> f64 {
    let Some(last) = token.chars().last() else {
        return 0.0;
    };
    match units.iter().find(|(suffix, _)| *suffix == last) {
        Some((_, factor)) => token[..token.len() - last.len_utf8()]
            .parse::<f64>()
            .map(|n| n * factor)
            .unwrap_or(0.0),
        None => token.parse::<f64>().unwrap_or(0.0),
    }
}

/// Result of one queue refresh: every message keyed by its id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub messages: BTreeMap<String, Message>,
}

impl QueueSnapshot {
    /// Snapshot standing for a failed `exim -bpr` invocation.
    pub fn error(text: impl Into<String>) -> Self {
        let mut messages = BTreeMap::new();
        messages.insert(ERROR_KEY.to_string(), Message::error_sentinel(text));
        Self { messages }
    }

    /// The invocation error, if this snapshot is the error placeholder.
    pub fn error_text(&self) -> Option<&str> {
        match self.messages.get(ERROR_KEY) {
            Some(m) if m.is_error() => m.recipients.first().map(String::as_str),
            _ => None,
        }
    }

    /// Number of messages in the queue.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn frozen_count(&self) -> usize {
        self.messages.values().filter(|m| m.frozen).count()
    }

    /// Sum of all message sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.messages.values().map(|m| m.size_bytes() as u64).sum()
    }

    /// One-line description, e.g. `3 messages in queue (1 frozen).`
    pub fn summary(&self) -> String {
        if let Some(text) = self.error_text() {
            return text.lines().last().unwrap_or(text).to_string();
        }
        let word = if self.len() > 1 { "messages" } else { "message" };
        format!(
            "{} {} in queue ({} frozen).",
            self.len(),
            word,
            self.frozen_count()
        )
    }
}
