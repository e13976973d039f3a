//! Non-blocking tail of the Exim main log.
//!
//! The tailer runs `tail -F` on the log (through `ssh`/`sudo` when
//! configured) and reads from its output pipe without ever blocking: every
//! [`LogTailer::update`] polls the pipe with a zero timeout and reads at most
//! one bounded chunk. `tail -F` follows the file by name, so a rotated log is
//! picked up by the running tail. When the log cannot be opened, or the
//! `tail` process goes away (remote connection dropped, sudo refused), the
//! tailer detaches and retries on every following `update`.
//!
//! Lines are split on `\n` per chunk. A line that straddles two chunks comes
//! out as two fragments; callers must tolerate that.

use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Stdio};

use tracing::{debug, info, warn};

use crate::error::{EximError, Result};
use crate::exim::command::ToolSettings;

/// Maximum number of bytes consumed per [`LogTailer::update`].
pub const READ_CHUNK: usize = 2000;

/// Directory holding the `tail` executable.
pub const TAIL_DIR: &str = "/usr/bin";

/// A running `tail -F` and the read end of its output.
struct TailProcess {
    child: Child,
    stdout: ChildStdout,
}

impl TailProcess {
    fn spawn(settings: &ToolSettings, path: &Path) -> Result<Self> {
        let command = settings
            .command_in(Path::new(TAIL_DIR), "tail")
            .arg_list(["-F", &*path.to_string_lossy()]);
        let rendered = command.render();
        let mut child = command
            .shell(true)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| EximError::Spawn {
                command: rendered.clone(),
                source,
            })?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EximError::LogUnavailable {
                path: path.to_path_buf(),
                reason: "tail output was not captured".to_string(),
            });
        };
        if let Err(e) = set_nonblocking(stdout.as_raw_fd()) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EximError::io(path, e));
        }
        debug!(command = %rendered, pid = child.id(), "Tail started");
        Ok(Self { child, stdout })
    }

    /// Read whatever is ready. `Ok(None)` means the tail is gone.
    fn read_ready(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        if !poll_readable(self.stdout.as_raw_fd())? {
            // Nothing buffered; make sure somebody is still writing.
            return match self.child.try_wait()? {
                Some(_) => Ok(None),
                None => Ok(Some(0)),
            };
        }
        match self.stdout.read(buf) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Some(0)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Some(0)),
            Err(e) => Err(e),
        }
    }
}

impl Drop for TailProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Follows the Exim main log and queues new lines for two consumers.
pub struct LogTailer {
    log_dir: PathBuf,
    mainlog_name: String,
    settings: ToolSettings,
    tail: Option<TailProcess>,
    /// False after a failed open has been reported, until an open succeeds.
    valid: bool,
    unseen: Vec<String>,
    for_processing: Vec<String>,
}

impl LogTailer {
    /// Create a tailer and try to attach to `<log_dir>/<mainlog_name>` at once.
    pub fn new(
        log_dir: impl Into<PathBuf>,
        mainlog_name: impl Into<String>,
        settings: ToolSettings,
    ) -> Self {
        let mut tailer = Self {
            log_dir: PathBuf::new(),
            mainlog_name: String::new(),
            settings,
            tail: None,
            valid: true,
            unseen: Vec::new(),
            for_processing: Vec::new(),
        };
        tailer.open(log_dir, mainlog_name);
        tailer
    }

    /// Attach to `<log_dir>/<mainlog_name>`, replacing any current tail.
    ///
    /// On failure the tailer is detached and, unless the failure was already
    /// reported, a single error line is queued for display.
    pub fn open(&mut self, log_dir: impl Into<PathBuf>, mainlog_name: impl Into<String>) {
        self.log_dir = log_dir.into();
        self.mainlog_name = mainlog_name.into();
        self.tail = None;

        let path = self.path();
        match self.attach(&path) {
            Ok(tail) => {
                if !self.valid {
                    info!(path = %path.display(), "Log file available again");
                }
                self.tail = Some(tail);
                self.valid = true;
            }
            Err(e) => {
                if self.valid {
                    warn!(path = %path.display(), error = %e, "Cannot tail log file");
                    self.unseen.push(format!(
                        "Error: could not open the exim log file at `{}`!",
                        path.display()
                    ));
                    self.valid = false;
                }
            }
        }
    }

    fn attach(&self, path: &Path) -> Result<TailProcess> {
        // Only a local, unprivileged tail can be checked up front. The user
        // may not even be able to stat the log a sudo or remote tail reads;
        // those report problems through their own output and exit.
        if !self.settings.use_ssh && !self.settings.use_sudo {
            std::fs::File::open(path).map_err(|e| EximError::io(path, e))?;
        }
        TailProcess::spawn(&self.settings, path)
    }

    /// Pull new lines from the tail, or try to re-attach when detached.
    ///
    /// Never blocks: zero bytes ready is the normal case.
    pub fn update(&mut self) {
        let Some(tail) = self.tail.as_mut() else {
            let (dir, name) = (self.log_dir.clone(), self.mainlog_name.clone());
            self.open(dir, name);
            return;
        };

        let mut buf = [0u8; READ_CHUNK];
        match tail.read_ready(&mut buf) {
            Ok(Some(0)) => {}
            Ok(Some(n)) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                let lines: Vec<String> = text
                    .split('\n')
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                self.for_processing.extend(lines.iter().cloned());
                self.unseen.extend(lines);
            }
            Ok(None) => {
                info!(path = %self.path().display(), "Tail process ended, re-attaching on next update");
                self.tail = None;
            }
            Err(e) => {
                warn!(path = %self.path().display(), error = %e, "Reading log failed, re-attaching on next update");
                self.tail = None;
            }
        }
    }

    /// Take all lines not yet shown.
    pub fn get_unseen(&mut self) -> Vec<String> {
        std::mem::take(&mut self.unseen)
    }

    /// Take all lines not yet counted by the activity meter.
    pub fn get_for_processing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.for_processing)
    }

    /// Whether a tail is currently running.
    pub fn is_attached(&self) -> bool {
        self.tail.is_some()
    }

    /// Full path of the followed log.
    pub fn path(&self) -> PathBuf {
        self.log_dir.join(&self.mainlog_name)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn mainlog_name(&self) -> &str {
        &self.mainlog_name
    }

    /// Change how `tail` is invoked. Applies from the next attach.
    pub fn set_settings(&mut self, settings: ToolSettings) {
        self.settings = settings;
    }

    /// Follow a different log file, re-attaching only if the location changed.
    pub fn set_location(&mut self, log_dir: impl Into<PathBuf>, mainlog_name: impl Into<String>) {
        let log_dir = log_dir.into();
        let mainlog_name = mainlog_name.into();
        if log_dir != self.log_dir || mainlog_name != self.mainlog_name {
            self.valid = true;
            self.open(log_dir, mainlog_name);
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: `fd` belongs to a ChildStdout that outlives this call.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above; only the status flags are changed.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Zero-timeout readiness check. Hang-up counts as readable so EOF is seen.
fn poll_readable(fd: RawFd) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pfd` is a single valid pollfd for the duration of the call.
    let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn detached(dir: &Path) -> LogTailer {
        LogTailer::new(dir, "missing.log", ToolSettings::default())
    }

    #[test]
    fn test_missing_file_yields_one_error_line() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tailer = detached(tmp.path());
        assert!(!tailer.is_attached());

        // Retries while the file is still missing add nothing.
        tailer.update();
        tailer.update();

        let unseen = tailer.get_unseen();
        assert_eq!(unseen.len(), 1);
        assert!(unseen[0].starts_with("Error: could not open the exim log file at"));
        assert!(unseen[0].contains("missing.log"));
        assert!(tailer.get_for_processing().is_empty());
    }

    #[test]
    fn test_drain_is_take_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tailer = detached(tmp.path());
        assert!(!tailer.get_unseen().is_empty());
        assert!(tailer.get_unseen().is_empty());
    }

    #[test]
    fn test_update_reads_new_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("mainlog");
        std::fs::write(&log, "first line\nsecond line\n").unwrap();

        let mut tailer = LogTailer::new(tmp.path(), "mainlog", ToolSettings::default());
        assert!(tailer.is_attached());

        let mut seen = Vec::new();
        let start = Instant::now();
        while seen.len() < 2 && start.elapsed() < Duration::from_secs(5) {
            tailer.update();
            seen.extend(tailer.get_unseen());
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(seen, vec!["first line".to_string(), "second line".to_string()]);
        assert_eq!(tailer.get_for_processing().len(), 2);
    }

    #[test]
    fn test_rotated_log_is_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("mainlog");
        std::fs::write(&log, "before rotation\n").unwrap();
        let mut tailer = LogTailer::new(tmp.path(), "mainlog", ToolSettings::default());

        let mut seen: Vec<String> = Vec::new();
        let mut collect_until = |tailer: &mut LogTailer, needle: &str| {
            let start = Instant::now();
            while start.elapsed() < Duration::from_secs(10) {
                tailer.update();
                seen.extend(tailer.get_unseen());
                if seen.iter().any(|l| l.contains(needle)) {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            false
        };
        assert!(collect_until(&mut tailer, "before rotation"));

        std::fs::rename(&log, tmp.path().join("mainlog.1")).unwrap();
        std::fs::write(&log, "after rotation\n").unwrap();
        assert!(collect_until(&mut tailer, "after rotation"));
    }

    #[test]
    fn test_set_location_to_same_file_keeps_tail() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mainlog"), "").unwrap();
        let mut tailer = LogTailer::new(tmp.path(), "mainlog", ToolSettings::default());
        let pid = tailer.tail.as_ref().map(|t| t.child.id());
        tailer.set_location(tmp.path(), "mainlog");
        assert_eq!(tailer.tail.as_ref().map(|t| t.child.id()), pid);
    }
}
