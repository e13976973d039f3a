//! Log analysis helpers: `exigrep`, `eximstats` and the reject log.

use std::path::{Path, PathBuf};

use crate::error::{EximError, Result};
use crate::exim::command::{shell_quote, ToolSettings};

/// Reject log names, in the order they are tried.
const REJECTLOG_NAMES: [&str; 2] = ["rejectlog", "reject.log"];

/// Directory holding `cat` for wrapped reads.
const CAT_DIR: &str = "/bin";

/// Where the Exim logs live, plus how to run tools against them.
#[derive(Debug, Clone)]
pub struct LogTools {
    settings: ToolSettings,
    log_dir: PathBuf,
    mainlog_name: String,
}

impl LogTools {
    pub fn new(settings: ToolSettings, log_dir: impl Into<PathBuf>, mainlog_name: impl Into<String>) -> Self {
        Self {
            settings,
            log_dir: log_dir.into(),
            mainlog_name: mainlog_name.into(),
        }
    }

    /// The main log, or every log in the directory (as a shell glob).
    fn log_target(&self, all_logs: bool) -> String {
        let name = if all_logs { "*" } else { self.mainlog_name.as_str() };
        self.log_dir.join(name).to_string_lossy().into_owned()
    }

    /// Run `exigrep` for `pattern`, a Perl regex unless `literal` is set.
    pub fn exigrep(&self, pattern: &str, literal: bool, all_logs: bool) -> String {
        let mut args = String::new();
        if literal {
            args.push_str("-l ");
        }
        args.push_str(&shell_quote(pattern));
        args.push(' ');
        args.push_str(&self.log_target(all_logs));
        self.settings.command("exigrep").args(args).output_text()
    }

    /// Run `eximstats` with extra arguments over the main log (or all logs).
    pub fn eximstats<S: AsRef<str>>(&self, args: &[S], all_logs: bool) -> String {
        let mut line: Vec<String> = args.iter().map(|a| shell_quote(a.as_ref())).collect();
        line.push(self.log_target(all_logs));
        self.settings
            .command("eximstats")
            .args(line.join(" "))
            .output_text()
    }

    /// Contents of the reject log (`rejectlog`, or `reject.log` on Debian).
    ///
    /// Remote or privileged setups read it with `cat` through the usual
    /// wrappers; otherwise the file is read directly.
    pub fn rejectlog(&self) -> Result<String> {
        if self.settings.use_ssh || self.settings.use_sudo {
            return Ok(self.cat_rejectlog(Path::new(CAT_DIR)));
        }

        let mut path = self.log_dir.join(REJECTLOG_NAMES[0]);
        if !path.exists() {
            path = self.log_dir.join(REJECTLOG_NAMES[1]);
        }
        std::fs::read_to_string(&path).map_err(|e| EximError::io(&path, e))
    }

    /// `cat` each candidate name through the wrappers until one exists.
    /// The last attempt's output is returned, diagnostics included.
    fn cat_rejectlog(&self, cat_dir: &Path) -> String {
        let mut output = String::new();
        for name in REJECTLOG_NAMES {
            let path = self.log_dir.join(name);
            output = self
                .settings
                .command_in(cat_dir, "cat")
                .arg_list([&*path.to_string_lossy()])
                .output_text();
            if !output.contains("No such file or directory") {
                break;
            }
        }
        output
    }
}
