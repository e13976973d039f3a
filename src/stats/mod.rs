//! Activity meter: message rates sampled from the main log.
//!
//! Every plotting interval the caller hands over the log lines that arrived
//! since the previous sample together with the current queue length. Lines
//! are counted per category and normalised to events per second.

use std::collections::VecDeque;
use std::time::Duration;

use regex::Regex;

/// Number of samples kept per series.
pub const KEEP_HISTORY: usize = 2000;

const DELTA: f64 = 0.000_000_1;

/// Series definitions: label and the log pattern counted for it.
/// The queue series has no pattern; it samples the queue length.
const SERIES: [(&str, Option<&str>); 5] = [
    ("in", Some(" <= ")),
    ("out", Some(" => ")),
    ("local", Some(" => .+ R=local")),
    ("smtp", Some(r" => .+ T=[^ ]*smtp")),
    ("queue", None),
];

/// One plotted series.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: &'static str,
    pattern: Option<Regex>,
    history: VecDeque<f64>,
}

impl Series {
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    pub fn last(&self) -> f64 {
        self.history.back().copied().unwrap_or(0.0)
    }

    /// Label with the latest value and, when rescaled, the zoom factor,
    /// e.g. `out (10x): 23.0`.
    pub fn caption(&self) -> String {
        let scale = scale(self.history.iter().copied());
        let mut caption = self.label.to_string();
        if (scale - 0.1).abs() > DELTA {
            caption.push_str(&format!(" ({}x)", (0.1 / scale).round() as u64));
        }
        caption.push_str(&format!(": {:.1}", self.last()));
        caption
    }

    fn push(&mut self, value: f64) {
        self.history.push_back(value);
        while self.history.len() > KEEP_HISTORY {
            self.history.pop_front();
        }
    }
}

/// Multiplier normalising a series into `0..=1`.
///
/// Series that never reach 10 use the fixed 0-10 range.
pub fn scale(values: impl IntoIterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.into_iter().collect();
    let largest = values.iter().copied().fold(f64::MIN, f64::max);
    if values.len() < 2 || largest < 10.0 {
        return 0.1;
    }
    let mut scale = 1.0;
    while largest * scale > 1.0 {
        scale /= 10.0;
    }
    scale
}

/// Rolling message-rate history for the activity plot.
#[derive(Debug, Clone)]
pub struct ActivityMeter {
    series: Vec<Series>,
    interval: Duration,
}

impl ActivityMeter {
    pub fn new(interval: Duration) -> Self {
        let series = SERIES
            .iter()
            .map(|&(label, pattern)| Series {
                label,
                pattern: pattern.map(|p| Regex::new(p).expect("valid activity pattern")),
                history: VecDeque::new(),
            })
            .collect();
        Self { series, interval }
    }

    /// Record one sample from new log lines and the current queue length.
    pub fn sample(&mut self, lines: &[String], queue_length: usize) {
        let per_second = 1000.0 / self.interval.as_millis().max(1) as f64;
        for series in &mut self.series {
            let value = match &series.pattern {
                Some(re) => lines.iter().filter(|l| re.is_match(l)).count() as f64 * per_second,
                None => queue_length as f64,
            };
            series.push(value);
        }
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the sampling interval; later samples are normalised with it.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sample_counts_categories() {
        let mut meter = ActivityMeter::new(Duration::from_millis(1000));
        meter.sample(
            &lines(&[
                "2024-03-01 10:00:00 1AttSk-0002qB-00 <= alice@example.org H=mx [192.0.2.1] S=1234",
                "2024-03-01 10:00:01 1AttSk-0002qB-00 => bob@example.net R=dnslookup T=remote_smtp H=mx2",
                "2024-03-01 10:00:01 1AttSk-0002qB-00 => carol@localhost R=localuser T=local_delivery",
                "2024-03-01 10:00:02 1AttSk-0002qB-00 Completed",
            ]),
            7,
        );
        let last: Vec<(&str, f64)> = meter.series().iter().map(|s| (s.label, s.last())).collect();
        assert_eq!(
            last,
            vec![("in", 1.0), ("out", 2.0), ("local", 1.0), ("smtp", 1.0), ("queue", 7.0)]
        );
    }

    #[test]
    fn test_rates_are_per_second() {
        let mut meter = ActivityMeter::new(Duration::from_millis(500));
        meter.sample(&lines(&["x <= a", "y <= b"]), 0);
        assert_eq!(meter.series()[0].last(), 4.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut meter = ActivityMeter::new(Duration::from_millis(1000));
        for _ in 0..KEEP_HISTORY + 10 {
            meter.sample(&[], 1);
        }
        assert!(meter.series().iter().all(|s| s.history().len() == KEEP_HISTORY));
    }

    #[test]
    fn test_scale() {
        assert_eq!(scale([1.0]), 0.1);
        assert_eq!(scale([1.0, 9.0]), 0.1);
        assert!((scale([1.0, 42.0]) - 0.01).abs() < DELTA);
        assert!((scale([5.0, 420.0]) - 0.001).abs() < DELTA);
    }

    #[test]
    fn test_caption() {
        let mut meter = ActivityMeter::new(Duration::from_millis(1000));
        meter.sample(&[], 3);
        meter.sample(&[], 42);
        let queue = &meter.series()[4];
        assert_eq!(queue.caption(), "queue (10x): 42.0");
        assert_eq!(meter.series()[0].caption(), "in: 0.0");
    }
}
