//! Building and running Exim tool command lines.
//!
//! Every tool is started through `sh -c` with stderr folded into stdout, so
//! the text returned to callers contains the tool's own diagnostics
//! ("No such file or directory", "permission denied", ...). The exit status
//! is ignored; callers classify the text.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EximError, Result};

/// How to reach the Exim tools: where they live and which wrappers to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Directory holding `exim`, `exiwhat`, `exigrep`, `eximstats`.
    pub bin_dir: PathBuf,
    /// Name of the Exim executable inside `bin_dir`.
    pub exim_binary: String,
    pub use_sudo: bool,
    pub use_ssh: bool,
    /// Remote host used when `use_ssh` is set.
    pub hostname: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("/usr/sbin"),
            exim_binary: "exim".to_string(),
            use_sudo: false,
            use_ssh: false,
            hostname: String::new(),
        }
    }
}

impl ToolSettings {
    /// Command line for `program` in `bin_dir` with these wrappers applied.
    pub fn command(&self, program: &str) -> CommandLine {
        self.command_in(&self.bin_dir, program)
    }

    /// Command line for `program` in an explicit directory.
    pub fn command_in(&self, dir: &Path, program: &str) -> CommandLine {
        CommandLine::new(dir, program)
            .sudo(self.use_sudo)
            .ssh(self.use_ssh.then(|| self.hostname.clone()))
    }

    /// Command line for the Exim binary itself.
    pub fn exim(&self) -> CommandLine {
        self.command(&self.exim_binary)
    }
}

/// A single shell command line: `[ssh <host> ][sudo ]<dir>/<program>[ <args>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    dir: PathBuf,
    program: String,
    args: String,
    sudo: bool,
    ssh_host: Option<String>,
}

impl CommandLine {
    pub fn new(dir: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            program: program.into(),
            args: String::new(),
            sudo: false,
            ssh_host: None,
        }
    }

    /// Set the argument string, passed to the shell verbatim.
    pub fn args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    /// Set the arguments from a list. Each item is quoted for the shell
    /// when needed, so it reaches the program as exactly one argument.
    pub fn arg_list<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = args
            .into_iter()
            .map(|a| shell_quote(a.as_ref()))
            .collect::<Vec<_>>()
            .join(" ");
        self.args(joined)
    }

    pub fn sudo(mut self, enabled: bool) -> Self {
        self.sudo = enabled;
        self
    }

    pub fn ssh(mut self, host: Option<String>) -> Self {
        self.ssh_host = host;
        self
    }

    /// Render the full command line.
    ///
    /// With ssh the remote part is quoted once more, since the remote shell
    /// parses it again.
    pub fn render(&self) -> String {
        let mut cmd = String::new();
        if self.sudo {
            cmd.push_str("sudo ");
        }
        cmd.push_str(&shell_quote(&self.dir.join(&self.program).to_string_lossy()));
        if !self.args.is_empty() {
            cmd.push(' ');
            cmd.push_str(&self.args);
        }
        match &self.ssh_host {
            Some(host) => format!("ssh {} {}", shell_quote(host), shell_quote(&cmd)),
            None => cmd,
        }
    }

    /// Shell invocation with stderr merged into stdout and no stdin.
    pub(crate) fn shell(&self, exec: bool) -> Command {
        let line = if exec {
            format!("exec {} 2>&1", self.render())
        } else {
            format!("{} 2>&1", self.render())
        };
        let mut command = Command::new("sh");
        command.arg("-c").arg(line).stdin(Stdio::null());
        command
    }

    /// Run to completion and return the trimmed combined output.
    ///
    /// Blocks until the command exits. Only a failure to start the shell is
    /// an error; everything the tool itself reports comes back as text.
    pub fn output(&self) -> Result<String> {
        let rendered = self.render();
        debug!(command = %rendered, "Running command");
        let output = self.shell(false).output().map_err(|source| EximError::Spawn {
            command: rendered.clone(),
            source,
        })?;
        debug!(command = %rendered, status = %output.status, bytes = output.stdout.len(), "Command finished");
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Like [`output`](Self::output), but a spawn failure is folded into the
    /// returned text so it is classified like any other tool diagnostic.
    pub fn output_text(&self) -> String {
        self.output().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Command could not be started");
            e.to_string()
        })
    }

    /// Start the command in the background without waiting for it.
    ///
    /// The shell backgrounds the command and exits at once, so the command
    /// is reparented and never left as a zombie of this process.
    pub fn spawn_detached(&self) -> Result<()> {
        let rendered = self.render();
        debug!(command = %rendered, "Starting background command");
        Command::new("sh")
            .arg("-c")
            .arg(format!("{rendered} >/dev/null 2>&1 &"))
            .stdin(Stdio::null())
            .status()
            .map(drop)
            .map_err(|source| EximError::Spawn {
                command: rendered,
                source,
            })
    }
}

/// Quote `s` for `sh` unless it only holds characters the shell leaves alone.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.,:/@%+=".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
