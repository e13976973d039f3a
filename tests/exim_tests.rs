//! Integration tests: collectors, actions, log tools and the log tailer
//! driven by small shell scripts standing in for the Exim binaries.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use eximshell::exim::actions::QueueActions;
use eximshell::exim::command::ToolSettings;
use eximshell::exim::process::ProcessCollector;
use eximshell::exim::queue::{self, QueueCollector};
use eximshell::exim::tailer::LogTailer;
use eximshell::exim::tools::LogTools;
use eximshell::model::message::ERROR_KEY;

const WAIT: Duration = Duration::from_secs(10);

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Write an executable `sh` script named `name` into `dir`.
fn fake_tool(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn settings(dir: &Path) -> ToolSettings {
    ToolSettings {
        bin_dir: dir.to_path_buf(),
        ..ToolSettings::default()
    }
}

/// Call `step` until `done` holds or the deadline passes.
fn wait_until(mut step: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if step() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

// ─── Test 1: Queue listing from a fake exim ─────────────────────────

#[test]
fn test_queue_collector_publishes_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(
        tmp.path(),
        "exim",
        &format!("[ \"$1\" = -bpr ] && cat '{}'", fixture("queue_listing.txt").display()),
    );

    let (tx, rx) = mpsc::channel();
    let mut collector = QueueCollector::new(settings(tmp.path()), move |snapshot| {
        let _ = tx.send(snapshot);
    })
    .unwrap();
    collector.refresh();

    let snapshot = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.frozen_count(), 1);
    assert_eq!(snapshot.summary(), "3 messages in queue (1 frozen).");
    let m = snapshot.get("1AttSm-0002qD-00").unwrap();
    assert_eq!(m.sender, "<newsletter@example.com>");
    assert_eq!(m.recipients, vec!["D dave@example.net", "erin@example.net"]);

    // The published snapshot matches what the callback saw.
    assert_eq!(*collector.snapshot(), snapshot);
    assert_eq!(collector.queue_length(), 3);
    assert!(collector.stop());
}

// ─── Test 2: Missing exim binary yields the error placeholder ───────

#[test]
fn test_queue_collector_reports_missing_binary() {
    let tmp = tempfile::tempdir().unwrap();

    let (tx, rx) = mpsc::channel();
    let mut collector = QueueCollector::new(settings(tmp.path()), move |snapshot| {
        let _ = tx.send(snapshot);
    })
    .unwrap();
    collector.refresh();

    let snapshot = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(snapshot.len(), 1);
    let sentinel = snapshot.get(ERROR_KEY).unwrap();
    assert!(sentinel.frozen);
    assert!(sentinel.recipients[0].starts_with("Error invoking `exim -bpr`:\n"));
    assert_eq!(collector.queue_length(), 0, "the error entry is not a message");
    assert!(collector.stop());
}

// ─── Test 3: Settings swap applies to the next cycle ────────────────

#[test]
fn test_queue_collector_settings_swap() {
    let empty = tempfile::tempdir().unwrap();
    let real = tempfile::tempdir().unwrap();
    fake_tool(
        real.path(),
        "exim4",
        &format!("cat '{}'", fixture("queue_listing.txt").display()),
    );

    let (tx, rx) = mpsc::channel();
    let mut collector = QueueCollector::new(settings(empty.path()), move |snapshot| {
        let _ = tx.send(snapshot);
    })
    .unwrap();
    collector.refresh();
    assert!(rx.recv_timeout(WAIT).unwrap().error_text().is_some());

    collector.set_settings(ToolSettings {
        exim_binary: "exim4".to_string(),
        ..settings(real.path())
    });
    collector.refresh();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().len(), 3);
    assert_eq!(collector.queue_length(), 3);

    // A failing cycle keeps the last good count.
    collector.set_settings(settings(empty.path()));
    collector.refresh();
    assert!(rx.recv_timeout(WAIT).unwrap().error_text().is_some());
    assert_eq!(collector.queue_length(), 3);
    assert!(collector.stop());
}

// ─── Test 4: exiwhat output through the process collector ───────────

#[test]
fn test_process_collector() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(
        tmp.path(),
        "exiwhat",
        &format!("cat '{}'", fixture("exiwhat.txt").display()),
    );

    let (tx, rx) = mpsc::channel();
    let mut collector = ProcessCollector::new(settings(tmp.path()), move |snapshot| {
        let _ = tx.send(snapshot);
    })
    .unwrap();
    collector.refresh();

    let snapshot = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(snapshot.summary, "3 exim processes.");
    assert!(snapshot.processes[&4302].starts_with("handling incoming connection"));
    assert_eq!(*collector.snapshot(), snapshot);
    assert!(collector.stop());
}

#[test]
fn test_process_collector_permission_problem() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(
        tmp.path(),
        "exiwhat",
        "echo 'exiwhat: /var/spool/exim/exim-process.info: Permission denied' >&2; exit 1",
    );

    let snapshot = eximshell::exim::process::collect(&settings(tmp.path()));
    assert_eq!(snapshot.summary, "Permission problems!");
    assert!(snapshot.is_empty());
}

// ─── Test 5: Actions check every output line ────────────────────────

const ACTION_EXIM: &str = r#"flag="$1"; shift
case "$flag" in
  -Mf) for id in "$@"; do echo "Message $id is now frozen"; done ;;
  -Mt) for id in "$@"; do echo "Message $id is not frozen"; done ;;
  -Mar|-Mes) echo "$@" > "$(dirname "$0")/args"; echo "Message $1 has been modified" ;;
  -Mvh) echo "245P Received: from alice by mx.example.org" ;;
  -q) touch "$(dirname "$0")/queue-run" ;;
esac"#;

#[test]
fn test_freeze_reports_count() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(tmp.path(), "exim", ACTION_EXIM);
    let actions = QueueActions::new(settings(tmp.path()));

    let ids = vec!["1AttSk-0002qB-00".to_string(), "1AttSl-0002qC-00".to_string()];
    let outcome = actions.freeze(&ids);
    assert!(outcome.success);
    assert_eq!(outcome.message, "2 messages have been frozen.");
}

#[test]
fn test_thaw_failure_lists_exim_output() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(tmp.path(), "exim", ACTION_EXIM);
    let actions = QueueActions::new(settings(tmp.path()));

    let outcome = actions.thaw(&["1AttSk-0002qB-00".to_string()]);
    assert!(!outcome.success);
    assert_eq!(outcome.message, "Message 1AttSk-0002qB-00 is not frozen");
}

#[test]
fn test_add_recipients_passes_each_address() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(tmp.path(), "exim", ACTION_EXIM);
    let actions = QueueActions::new(settings(tmp.path()));

    let outcome = actions.add_recipients("1AttSk-0002qB-00", " frank@example.net  grace@example.net ");
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "1 message has been modified.");
    let args = std::fs::read_to_string(tmp.path().join("args")).unwrap();
    assert_eq!(args.trim(), "1AttSk-0002qB-00 frank@example.net grace@example.net");
}

#[test]
fn test_edit_sender_to_null_sender() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(tmp.path(), "exim", ACTION_EXIM);
    let actions = QueueActions::new(settings(tmp.path()));

    let outcome = actions.edit_sender("1AttSk-0002qB-00", "<>");
    assert!(outcome.success, "{}", outcome.message);
    let args = std::fs::read_to_string(tmp.path().join("args")).unwrap();
    assert_eq!(args.trim(), "1AttSk-0002qB-00 <>");
}

#[test]
fn test_recipient_is_not_run_by_the_shell() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(tmp.path(), "exim", ACTION_EXIM);
    let actions = QueueActions::new(settings(tmp.path()));
    let marker = tmp.path().join("injected");
    let recipient = format!("a@b.example;touch${{IFS}}{}", marker.display());

    let outcome = actions.add_recipients("1AttSk-0002qB-00", &recipient);
    assert!(outcome.success, "{}", outcome.message);
    assert!(!marker.exists());
    let args = std::fs::read_to_string(tmp.path().join("args")).unwrap();
    assert_eq!(args.trim(), format!("1AttSk-0002qB-00 {recipient}"));
}

#[test]
fn test_headers_query_returns_output() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(tmp.path(), "exim", ACTION_EXIM);
    let actions = QueueActions::new(settings(tmp.path()));

    assert_eq!(
        actions.message_headers("1AttSk-0002qB-00"),
        "245P Received: from alice by mx.example.org"
    );
}

#[test]
fn test_run_queue_returns_immediately() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(tmp.path(), "exim", ACTION_EXIM);
    let actions = QueueActions::new(settings(tmp.path()));

    let notice = actions.run_queue().unwrap();
    assert_eq!(notice, "Spawning a queue runner in the background.");
    let marker = tmp.path().join("queue-run");
    assert!(wait_until(|| marker.exists()));
}

// ─── Test 6: Log tools ──────────────────────────────────────────────

#[test]
fn test_exigrep_arguments() {
    let tmp = tempfile::tempdir().unwrap();
    fake_tool(tmp.path(), "exigrep", r#"echo "$@""#);
    let tools = LogTools::new(settings(tmp.path()), "/var/log/exim", "mainlog");

    assert_eq!(
        tools.exigrep("alice@example.org", true, false),
        "-l alice@example.org /var/log/exim/mainlog"
    );
}

#[test]
fn test_rejectlog_reads_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("rejectlog"),
        "2024-03-01 10:00:00 H=[203.0.113.9] rejected RCPT <x@example.org>\n",
    )
    .unwrap();
    let tools = LogTools::new(ToolSettings::default(), tmp.path(), "mainlog");
    assert!(tools.rejectlog().unwrap().contains("rejected RCPT"));
}

// ─── Test 7: Tailer follows appends and recovers from a missing log ──

#[test]
fn test_tailer_recovers_when_log_appears() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("mainlog");

    let mut tailer = LogTailer::new(tmp.path(), "mainlog", ToolSettings::default());
    assert!(!tailer.is_attached());
    for _ in 0..3 {
        tailer.update();
    }
    let unseen = tailer.get_unseen();
    assert_eq!(unseen.len(), 1, "the open error is reported once");
    assert!(unseen[0].starts_with("Error: could not open the exim log file"));
    assert!(tailer.get_for_processing().is_empty());

    std::fs::write(
        &log,
        "2024-03-01 10:00:00 1AttSk-0002qB-00 <= alice@example.org H=mx [192.0.2.1] S=1234\n",
    )
    .unwrap();

    let mut seen = Vec::new();
    assert!(wait_until(|| {
        tailer.update();
        seen.extend(tailer.get_unseen());
        seen.iter().any(|l| l.contains("<= alice@example.org"))
    }));
    assert!(tailer.is_attached());
    assert!(tailer
        .get_for_processing()
        .iter()
        .any(|l| l.contains("<= alice@example.org")));
}

// ─── Test 8: Parser over the fixture ────────────────────────────────

#[test]
fn test_parse_fixture_listing() {
    let text = std::fs::read_to_string(fixture("queue_listing.txt")).unwrap();
    let records = queue::parse_listing(&text);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.is_ok()));

    let snapshot = queue::parse_output(&text);
    assert_eq!(snapshot.total_size(), 2969 + 1228 + 14 * 1024 * 1024);
}
