//! Tailing through `sudo`. Kept in its own test binary because it puts a
//! stand-in `sudo` first on `PATH` for the whole process.

use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

use eximshell::exim::command::ToolSettings;
use eximshell::exim::tailer::LogTailer;

// ─── Test 1: A log the user cannot stat is still tailed via sudo ────

#[test]
fn test_sudo_tail_skips_local_checks() {
    let bin = tempfile::tempdir().unwrap();
    let sudo = bin.path().join("sudo");
    // Stands in for a privileged tail: report the arguments, then keep the
    // pipe open like `tail -F` would.
    std::fs::write(
        &sudo,
        "#!/bin/sh\necho \"privileged: $*\"\nexec sleep 30\n",
    )
    .unwrap();
    std::fs::set_permissions(&sudo, std::fs::Permissions::from_mode(0o755)).unwrap();

    let path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{path}", bin.path().display()));

    let settings = ToolSettings {
        use_sudo: true,
        ..ToolSettings::default()
    };
    let mut tailer = LogTailer::new("/nonexistent/exim-logs", "mainlog", settings);
    assert!(tailer.is_attached());

    let mut seen = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    while seen.is_empty() && Instant::now() < deadline {
        tailer.update();
        seen.extend(tailer.get_unseen());
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(
        seen,
        vec!["privileged: /usr/bin/tail -F /nonexistent/exim-logs/mainlog".to_string()]
    );
    assert!(tailer.is_attached());
}
