//! CLI entry point for `eximshell`.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use eximshell::config::{self, Config};
use eximshell::exim::actions::{ActionOutcome, QueueActions};
use eximshell::exim::tailer::LogTailer;
use eximshell::exim::tools::LogTools;
use eximshell::exim::{process, queue};
use eximshell::model::logline;
use eximshell::model::message::QueueSnapshot;

#[derive(Parser)]
#[command(
    name = "eximshell",
    version,
    about = "Terminal monitor for the Exim mail server",
    long_about = "Follow the Exim main log, watch the queue and running processes, \
                  and act on queued messages from the terminal."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run every Exim command through sudo
    #[arg(long, global = true)]
    sudo: bool,

    /// Run every Exim command on HOST through ssh
    #[arg(long, global = true, value_name = "HOST")]
    ssh: Option<String>,

    /// Directory holding exim, exiwhat, exigrep and eximstats
    #[arg(long, global = true, value_name = "DIR")]
    bin_dir: Option<PathBuf>,

    /// Directory holding the Exim logs
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive monitor (default)
    Watch,
    /// List the mail queue
    Queue {
        #[arg(long)]
        json: bool,
    },
    /// List running Exim processes
    Processes {
        #[arg(long)]
        json: bool,
    },
    /// Follow the main log
    Tail {
        /// Print lines unchanged, including the date
        #[arg(long)]
        raw: bool,
    },
    /// Show part of a queued message
    Show {
        id: String,
        #[arg(value_enum, default_value = "headers")]
        part: MessagePart,
    },
    /// Remove messages from the queue
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Freeze messages
    Freeze {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Thaw frozen messages
    Thaw {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Force a delivery attempt
    Deliver {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Give up on messages and bounce them
    GiveUp {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Mark all recipients of messages as delivered
    MarkDelivered {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Add recipients to a message
    AddRecipients {
        id: String,
        #[arg(required = true)]
        recipients: Vec<String>,
    },
    /// Change the envelope sender of a message
    EditSender { id: String, sender: String },
    /// Start a queue runner in the background
    RunQueue,
    /// Print every Exim configuration option
    EximConfig,
    /// Search the logs for messages matching a pattern
    Exigrep {
        pattern: String,
        /// Treat the pattern as a literal string
        #[arg(short, long)]
        literal: bool,
        /// Search every log in the log directory, not just the main log
        #[arg(short, long)]
        all: bool,
    },
    /// Summarise the logs with eximstats
    Eximstats {
        /// Analyse every log in the log directory
        #[arg(short, long)]
        all: bool,
        /// Extra arguments passed to eximstats
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Print the reject log
    Rejectlog,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, ValueEnum)]
enum MessagePart {
    Body,
    Headers,
    Log,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();
    apply_overrides(&mut config, &cli);

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let interactive = matches!(cli.command, None | Some(Commands::Watch));
    setup_logging(&log_level, &config, !interactive);

    let settings = config.paths.tool_settings();
    let actions = QueueActions::new(settings.clone());
    let tools = LogTools::new(
        settings,
        config.paths.log_dir.clone(),
        config.paths.mainlog_name.clone(),
    );

    match cli.command {
        None | Some(Commands::Watch) => eximshell::tui::run_tui(config),
        Some(Commands::Queue { json }) => cmd_queue(&config, json),
        Some(Commands::Processes { json }) => cmd_processes(&config, json),
        Some(Commands::Tail { raw }) => cmd_tail(&config, raw),
        Some(Commands::Show { id, part }) => {
            let text = match part {
                MessagePart::Body => actions.message_body(&id),
                MessagePart::Headers => actions.message_headers(&id),
                MessagePart::Log => actions.message_log(&id),
            };
            println!("{text}");
            Ok(())
        }
        Some(Commands::Remove { ids }) => report(actions.remove(&ids)),
        Some(Commands::Freeze { ids }) => report(actions.freeze(&ids)),
        Some(Commands::Thaw { ids }) => report(actions.thaw(&ids)),
        Some(Commands::Deliver { ids }) => report(with_spinner("Delivering...", || {
            actions.deliver(&ids)
        })),
        Some(Commands::GiveUp { ids }) => report(actions.give_up(&ids)),
        Some(Commands::MarkDelivered { ids }) => report(actions.mark_all_delivered(&ids)),
        Some(Commands::AddRecipients { id, recipients }) => {
            report(actions.add_recipients(&id, &recipients.join(" ")))
        }
        Some(Commands::EditSender { id, sender }) => report(actions.edit_sender(&id, &sender)),
        Some(Commands::RunQueue) => {
            println!("{}", actions.run_queue()?);
            Ok(())
        }
        Some(Commands::EximConfig) => {
            println!("{}", actions.configuration());
            Ok(())
        }
        Some(Commands::Exigrep {
            pattern,
            literal,
            all,
        }) => {
            let output = with_spinner("Searching logs...", || tools.exigrep(&pattern, literal, all));
            println!("{output}");
            Ok(())
        }
        Some(Commands::Eximstats { all, args }) => {
            let output = with_spinner("Analysing logs...", || tools.eximstats(&args, all));
            println!("{output}");
            Ok(())
        }
        Some(Commands::Rejectlog) => {
            print!("{}", tools.rejectlog()?);
            Ok(())
        }
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

/// Command-line flags take precedence over the configuration file.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    let paths = &mut config.paths;
    if cli.sudo {
        paths.use_sudo = true;
    }
    if let Some(host) = &cli.ssh {
        paths.use_ssh = true;
        paths.hostname = host.clone();
    }
    if let Some(dir) = &cli.bin_dir {
        paths.bin_dir = dir.clone();
    }
    if let Some(dir) = &cli.log_dir {
        paths.log_dir = dir.clone();
    }
}

/// Set up tracing with the file log and, outside the TUI, stderr output.
fn setup_logging(level: &str, config: &Config, to_stderr: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = to_stderr.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    let log_dir = config::cache_dir(config);
    let file_layer = std::fs::create_dir_all(&log_dir).is_ok().then(|| {
        let file_appender = tracing_appender::rolling::never(&log_dir, "eximshell.log");
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
}

/// Run `work` behind a spinner on stderr.
fn with_spinner<T>(message: &str, work: impl FnOnce() -> T) -> T {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    let result = work();
    pb.finish_and_clear();
    result
}

/// Print an action outcome; failures become a non-zero exit.
fn report(outcome: ActionOutcome) -> anyhow::Result<()> {
    if outcome.success {
        println!("{}", outcome.message);
        Ok(())
    } else {
        anyhow::bail!("{}", outcome.message)
    }
}

/// Print the queue once.
fn cmd_queue(config: &Config, json: bool) -> anyhow::Result<()> {
    let settings = config.paths.tool_settings();
    let snapshot = with_spinner("Reading the queue...", || queue::collect(&settings));
    if let Some(error) = snapshot.error_text() {
        anyhow::bail!("{error}");
    }

    if json {
        print_queue_json(&snapshot)
    } else {
        print_queue_table(&snapshot);
        Ok(())
    }
}

/// Print the queue as a human-readable table.
fn print_queue_table(snapshot: &QueueSnapshot) {
    use humansize::{format_size, BINARY};

    println!();
    println!(
        "  {}  Total size: {}",
        snapshot.summary(),
        format_size(snapshot.total_size(), BINARY)
    );
    println!();

    if snapshot.is_empty() {
        return;
    }

    println!(
        "  {:>5} {:>6} {:<16} {:<30} Recipients",
        "Age", "Size", "Id", "Sender"
    );
    println!("  {}", "-".repeat(90));

    let mut messages: Vec<_> = snapshot.messages.values().collect();
    messages.sort_by(|a, b| b.age_minutes().total_cmp(&a.age_minutes()));
    for m in messages {
        let sender: String = m.sender.chars().take(30).collect();
        let frozen = if m.frozen { "*** frozen *** " } else { "" };
        println!(
            "  {:>5} {:>6} {:<16} {:<30} {frozen}{}",
            m.age,
            m.size,
            m.id,
            sender,
            m.recipients.join(", ")
        );
    }
    println!();
}

/// Print the queue as JSON.
fn print_queue_json(snapshot: &QueueSnapshot) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "message_count": snapshot.len(),
        "frozen_count": snapshot.frozen_count(),
        "total_size": snapshot.total_size(),
        "messages": snapshot.messages.values().collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print the running Exim processes once.
fn cmd_processes(config: &Config, json: bool) -> anyhow::Result<()> {
    let settings = config.paths.tool_settings();
    let snapshot = with_spinner("Running exiwhat...", || process::collect(&settings));

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!();
    println!("  {}", snapshot.summary);
    if !snapshot.is_empty() {
        println!();
        for (pid, info) in &snapshot.processes {
            println!("  {pid:>8}  {info}");
        }
    }
    println!();
    Ok(())
}

/// Follow the main log until interrupted.
fn cmd_tail(config: &Config, raw: bool) -> anyhow::Result<()> {
    let mut tailer = LogTailer::new(
        config.paths.log_dir.clone(),
        config.paths.mainlog_name.clone(),
        config.paths.tool_settings(),
    );
    let interval = config.timers.log();
    loop {
        tailer.update();
        for line in tailer.get_unseen() {
            if raw {
                println!("{line}");
            } else {
                let parts = logline::split(&line);
                println!(
                    "{}{}{}",
                    parts.time.unwrap_or(""),
                    parts.message_id.unwrap_or(""),
                    parts.rest
                );
            }
        }
        // Drop the copy kept for the activity meter.
        tailer.get_for_processing();
        thread::sleep(interval);
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "eximshell", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
