//! Presentation helpers for Exim main log lines.
//!
//! A main log line looks like
//! `2024-03-01 10:15:42 1AttSk-0002qB-00 <= alice@example.org ...`.
//! The date is dropped for display, the time and the message id (when
//! present) are split off so they can be highlighted.

/// A log line split into display parts. The parts borrow from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLineParts<'a> {
    /// `HH:MM:SS ` including the trailing space.
    pub time: Option<&'a str>,
    /// Message id, without surrounding spaces.
    pub message_id: Option<&'a str>,
    /// Everything else.
    pub rest: &'a str,
}

/// Split a raw main log line for display.
pub fn split(line: &str) -> LogLineParts<'_> {
    // Drop the leading date.
    let line = match line.find(' ') {
        Some(pos) => &line[pos + 1..],
        None => line,
    };

    let bytes = line.as_bytes();
    let has_time = bytes.len() > 9 && bytes[2] == b':' && bytes[5] == b':';
    let Some(time) = has_time.then(|| line.get(..9)).flatten() else {
        return LogLineParts {
            time: None,
            message_id: None,
            rest: line,
        };
    };

    let has_id = bytes.len() > 25 && bytes[15] == b'-' && bytes[22] == b'-';
    match (has_id.then(|| line.get(9..25)).flatten(), line.get(25..)) {
        (Some(id), Some(rest)) => LogLineParts {
            time: Some(time),
            message_id: Some(id),
            rest,
        },
        _ => LogLineParts {
            time: Some(time),
            message_id: None,
            rest: line.get(9..).unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_delivery_line() {
        let parts = split("2024-03-01 10:15:42 1AttSk-0002qB-00 => bob@example.org R=dnslookup T=remote_smtp");
        assert_eq!(parts.time, Some("10:15:42 "));
        assert_eq!(parts.message_id, Some("1AttSk-0002qB-00"));
        assert_eq!(parts.rest, " => bob@example.org R=dnslookup T=remote_smtp");
    }

    #[test]
    fn test_split_line_without_message_id() {
        let parts = split("2024-03-01 10:15:42 Start queue run: pid=4242");
        assert_eq!(parts.time, Some("10:15:42 "));
        assert_eq!(parts.message_id, None);
        assert_eq!(parts.rest, "Start queue run: pid=4242");
    }

    #[test]
    fn test_split_line_without_time() {
        let parts = split("Error: could not open the exim log file");
        assert_eq!(parts.time, None);
        assert_eq!(parts.rest, "could not open the exim log file");
    }

    #[test]
    fn test_split_multibyte_does_not_panic() {
        let parts = split("2024-03-01 10:15:42 ééééééééééééééééééé");
        assert_eq!(parts.time, Some("10:15:42 "));
        assert!(parts.message_id.is_none());
    }
}
