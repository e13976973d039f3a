//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EXIMSHELL_CONFIG` (environment variable)
//! 2. `~/.config/eximshell/config.toml` (Linux/macOS)
//! 3. Built-in defaults (with Exim 4 layouts auto-detected)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exim::command::ToolSettings;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where Exim, its tools and its logs live, and how to reach them.
    pub paths: PathsConfig,
    /// Polling intervals in milliseconds.
    pub timers: TimersConfig,
    /// Display toggles.
    pub display: DisplayConfig,
    /// Confirmation and notification behavior.
    pub popups: PopupsConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for the application log.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Paths and invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the Exim log files.
    pub log_dir: PathBuf,
    /// File name of the main log inside `log_dir`.
    pub mainlog_name: String,
    /// Directory holding `exim`, `exiwhat`, `exigrep` and `eximstats`.
    pub bin_dir: PathBuf,
    /// Name of the Exim executable ("exim" or "exim4").
    pub exim_binary: String,
    /// Prefix every command with `sudo`.
    pub use_sudo: bool,
    /// Run every command on `hostname` through `ssh`.
    pub use_ssh: bool,
    /// Remote host used when `use_ssh` is set.
    pub hostname: String,
}

/// Polling intervals, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimersConfig {
    pub log_interval: u64,
    pub queue_interval: u64,
    pub process_interval: u64,
    pub plotting_interval: u64,
}

/// Display toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show the activity plot above the log.
    pub show_plotter: bool,
    /// Show the process list on startup.
    pub show_process_list: bool,
    /// Keep the log scrolled to the newest line.
    pub track_log: bool,
    /// Show the status bar.
    pub show_statusbar: bool,
}

/// Confirmation and notification behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupsConfig {
    /// Ask before running a message action.
    pub confirm_actions: bool,
    /// Report successful actions, not just failures.
    pub report_success: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let mut paths = Self {
            log_dir: PathBuf::from("/var/log/exim"),
            mainlog_name: "mainlog".to_string(),
            bin_dir: PathBuf::from("/usr/sbin"),
            exim_binary: "exim".to_string(),
            use_sudo: false,
            use_ssh: false,
            hostname: String::new(),
        };
        paths.autodetect_exim4(Path::new("/"));
        paths
    }
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            log_interval: 200,
            queue_interval: 2000,
            process_interval: 5000,
            plotting_interval: 1000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_plotter: true,
            show_process_list: false,
            track_log: true,
            show_statusbar: true,
        }
    }
}

impl Default for PopupsConfig {
    fn default() -> Self {
        Self {
            confirm_actions: true,
            report_success: true,
        }
    }
}

impl PathsConfig {
    /// Switch to the Debian-style Exim 4 layout when it is present under `root`.
    pub fn autodetect_exim4(&mut self, root: &Path) {
        let exim4_logs = root.join("var/log/exim4");
        if exim4_logs.exists() {
            self.log_dir = PathBuf::from("/var/log/exim4");
        }
        if root.join("usr/sbin/exim4").exists() {
            self.exim_binary = "exim4".to_string();
        }
        let log_dir = root.join(self.log_dir.strip_prefix("/").unwrap_or(&self.log_dir));
        if log_dir.join("main.log").exists() {
            self.mainlog_name = "main.log".to_string();
        }
    }

    /// Full path of the main log.
    pub fn mainlog_path(&self) -> PathBuf {
        self.log_dir.join(&self.mainlog_name)
    }

    /// Invocation settings for the Exim tools.
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            bin_dir: self.bin_dir.clone(),
            exim_binary: self.exim_binary.clone(),
            use_sudo: self.use_sudo,
            use_ssh: self.use_ssh,
            hostname: self.hostname.clone(),
        }
    }
}

impl TimersConfig {
    pub fn log(&self) -> Duration {
        interval(self.log_interval)
    }

    pub fn queue(&self) -> Duration {
        interval(self.queue_interval)
    }

    pub fn process(&self) -> Duration {
        interval(self.process_interval)
    }

    pub fn plotting(&self) -> Duration {
        interval(self.plotting_interval)
    }
}

/// Intervals below 50 ms would turn the UI loop into a busy loop.
fn interval(millis: u64) -> Duration {
    Duration::from_millis(millis.max(50))
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EXIMSHELL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("eximshell").join("config.toml"))
}

/// Return the cache directory for the application log.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eximshell")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("eximshell.log")
}
