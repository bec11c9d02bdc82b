// # feedpipe - command-line front end
//
// This binary is a THIN integration layer. All task, entry and scheduling
// logic lives in feedpipe-core. The binary is responsible for:
// 1. Parsing the command line
// 2. Initializing logging
// 3. Loading configuration and building the runner
// 4. Running the engine once (`execute`) or as a daemon (`daemon start`)
// 5. Mapping the outcome to an exit code
//
// ## Commands
//
// Subcommands may be abbreviated to any unambiguous prefix (`exec`, `d st`).
//
// ```bash
// feedpipe -c config.yml execute --task 'tv-*' --learn
// feedpipe execute --inject "Show S01E01" --task tv
// feedpipe --cron daemon start --autoreload-config
// ```
//
// ## Signals (daemon)
//
// - `SIGHUP`: reload the config from disk
// - `SIGINT` / `SIGTERM`: stop once the current task finishes

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use feedpipe_core::{
    inject_entries, AppConfig, DaemonHandle, EngineEvent, ExecuteOptions, PipelineEngine,
    RunnerRegistry,
};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, registry, EnvFilter};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_LOGFILE: &str = "feedpipe.log";
const NO_DAEMON: &str = "There does not appear to be a daemon running.";

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (a task failed or the daemon aborted)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedpipeExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<FeedpipeExitCode> for ExitCode {
    fn from(code: FeedpipeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "feedpipe",
    version,
    about = "Process feeds through configurable tasks",
    infer_subcommands = true
)]
struct Cli {
    /// Verbose what would happen on normal execution
    #[arg(long)]
    test: bool,

    /// Specify configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Specify a custom logfile name/location [default: feedpipe.log in the config directory]
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// Set the verbosity of the logger
    #[arg(short = 'L', long, value_enum, default_value_t = LogLevel::Verbose)]
    loglevel: LogLevel,

    #[arg(long, hide = true)]
    debug: bool,

    #[arg(long, hide = true)]
    debug_trace: bool,

    /// Use when executing non-interactively: disables console output, reduces logging level
    #[arg(long)]
    cron: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute tasks now
    Execute(ExecuteArgs),

    /// Run continuously, executing tasks according to schedules defined in config
    #[command(infer_subcommands = true)]
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Args, Debug)]
struct ExecuteArgs {
    /// Run only specified task(s), optionally using glob patterns ("tv-*"); case-insensitive
    #[arg(long = "task", visible_alias = "tasks", value_name = "TASK")]
    tasks: Vec<String>,

    /// Matches are not accepted but will be skipped in the future
    #[arg(long)]
    learn: bool,

    #[arg(long = "disable-phase", alias = "disable-phases", hide = true)]
    disable_phases: Vec<String>,

    #[arg(long, hide = true, value_name = "TITLE")]
    inject: Vec<String>,

    #[arg(long, hide = true)]
    retry: bool,

    /// Disable caches. Works only in runners that have explicit support
    #[arg(long = "no-cache")]
    nocache: bool,
}

#[derive(Subcommand, Debug)]
enum DaemonAction {
    /// Start the daemon
    Start {
        /// Causes process to daemonize after starting (not supported; runs in the foreground)
        #[arg(short, long)]
        daemonize: bool,

        /// Automatically reload the config from disk if the daemon detects any changes
        #[arg(long)]
        autoreload_config: bool,
    },

    /// Shutdown the running daemon
    Stop {
        /// Wait for all queued tasks to finish before stopping daemon
        #[arg(long)]
        wait: bool,
    },

    /// Check if a daemon is running
    Status,

    /// Causes a running daemon to reload the config from disk
    ReloadConfig,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    None,
    Critical,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::None => "off",
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info | LogLevel::Verbose => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Cli {
    fn effective_loglevel(&self) -> LogLevel {
        if self.debug_trace {
            LogLevel::Trace
        } else if self.debug {
            LogLevel::Debug
        } else if self.cron {
            LogLevel::Info
        } else {
            self.loglevel
        }
    }

    fn logfile_path(&self) -> PathBuf {
        let config_dir = self
            .config
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        match &self.logfile {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => config_dir.join(path),
            None => config_dir.join(DEFAULT_LOGFILE),
        }
    }

    /// Print to stdout unless running under cron
    fn console(&self, message: impl Display) {
        if !self.cron {
            println!("{message}");
        }
    }

    /// Print to stderr unless running under cron
    fn console_err(&self, message: impl Display) {
        if !self.cron {
            eprintln!("{message}");
        }
    }
}

/// Install the global subscriber: console (stderr) plus an append-mode log file
fn init_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.effective_loglevel().directive()));

    let path = cli.logfile_path();
    let file = match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            cli.console_err(format!(
                "Warning: Could not open log file {}: {}. Logging to console only.",
                path.display(),
                e
            ));
            None
        }
    };

    let console_layer = (!cli.cron).then(|| fmt::layer().with_writer(std::io::stderr));
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
    });

    registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("{e:#}");
        return FeedpipeExitCode::ConfigError.into();
    }

    // There is no inter-process dispatch: control commands can only reach a
    // daemon through its own signal handlers.
    if let Command::Daemon { action } = &cli.command
        && !matches!(action, DaemonAction::Start { .. })
    {
        cli.console_err(NO_DAEMON);
        return FeedpipeExitCode::CleanShutdown.into();
    }

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            cli.console_err(format!("Could not load {}: {}", cli.config.display(), e));
            return FeedpipeExitCode::ConfigError.into();
        }
    };
    info!("Configuration loaded: {} task(s)", config.tasks.len());

    let registry = RunnerRegistry::with_builtin();
    let runner = match registry.create_runner(&config.runner) {
        Ok(runner) => runner,
        Err(e) => {
            error!("{}", e);
            cli.console_err(&e);
            return FeedpipeExitCode::ConfigError.into();
        }
    };

    let (engine, events) = match PipelineEngine::new(runner, config) {
        Ok(pair) => pair,
        Err(e) => {
            error!("{}", e);
            cli.console_err(&e);
            return FeedpipeExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FeedpipeExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        tokio::spawn(log_events(events));
        match &cli.command {
            Command::Execute(args) => execute(&cli, args, &engine).await,
            Command::Daemon {
                action:
                    DaemonAction::Start {
                        daemonize,
                        autoreload_config,
                    },
            } => run_daemon(&cli, engine, *daemonize, *autoreload_config)
                .await
                .map(|()| FeedpipeExitCode::CleanShutdown),
            Command::Daemon { .. } => Ok(FeedpipeExitCode::CleanShutdown),
        }
    });

    match result {
        Ok(code) => code.into(),
        Err(e) => {
            error!("{:#}", e);
            FeedpipeExitCode::RuntimeError.into()
        }
    }
}

/// Drain engine events into the log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "engine event");
    }
}

/// Run the selected tasks once
async fn execute(cli: &Cli, args: &ExecuteArgs, engine: &PipelineEngine) -> Result<FeedpipeExitCode> {
    let options = ExecuteOptions {
        tasks: args.tasks.clone(),
        learn: args.learn,
        disable_phases: args.disable_phases.clone(),
        inject: inject_entries(&args.inject).context("Invalid --inject title")?,
        retry: args.retry,
        nocache: args.nocache,
        test: cli.test,
    };

    if cli.test {
        info!("Test mode: nothing will be remembered");
    }

    let summary = engine.execute(&options).await?;

    for report in &summary.reports {
        for entry in &report.accepted {
            cli.console(format!("ACCEPTED [{}] {}", report.task, entry));
        }
        for entry in &report.learned {
            cli.console(format!("LEARNED  [{}] {}", report.task, entry));
        }
    }
    for failure in &summary.failures {
        cli.console_err(format!("Task {} failed: {}", failure.task, failure.error));
    }

    Ok(if summary.is_success() {
        FeedpipeExitCode::CleanShutdown
    } else {
        FeedpipeExitCode::RuntimeError
    })
}

/// Run the daemon in the foreground until a stop signal
async fn run_daemon(cli: &Cli, engine: PipelineEngine, daemonize: bool, autoreload: bool) -> Result<()> {
    if daemonize {
        warn!("Daemonizing is not supported on this platform; running in the foreground");
    }

    let (handle, control) = DaemonHandle::channel();
    let control = control.with_autoreload(autoreload);
    let mut engine = engine.with_config_path(&cli.config);

    info!("Starting feedpipe daemon (PID: {})", std::process::id());
    let daemon = tokio::spawn(async move { engine.run_daemon(control).await });

    let quiet = cli.cron;
    let signals = tokio::spawn(async move {
        if let Err(e) = forward_signals(handle, quiet).await {
            error!("Signal handling stopped: {:#}", e);
        }
    });

    let result = daemon.await.context("Daemon task panicked")?;
    signals.abort();
    result?;

    info!("Daemon stopped");
    Ok(())
}

/// Translate process signals into daemon commands
#[cfg(unix)]
async fn forward_signals(handle: DaemonHandle, quiet: bool) -> Result<()> {
    let mut sighup = signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;

    loop {
        let name = tokio::select! {
            _ = sighup.recv() => {
                if !quiet {
                    println!("Reloading config from disk.");
                }
                let message = match handle.reload_config().await {
                    Ok(()) => "Config successfully reloaded from disk.".to_string(),
                    Err(e) => format!("Error loading config: {e}"),
                };
                if !quiet {
                    println!("{message}");
                }
                continue;
            }
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };

        info!("Received {}, shutdown will commence when the currently running task (if any) has finished", name);
        handle.shutdown(false).await?;
        return Ok(());
    }
}

/// Translate CTRL-C into a daemon shutdown
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn forward_signals(handle: DaemonHandle, _quiet: bool) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    info!("Received SIGINT");
    handle.shutdown(false).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_prefix_subcommands() {
        let cli = Cli::try_parse_from(["feedpipe", "exec", "--task", "tv-*", "--tasks", "movies"]).unwrap();
        match cli.command {
            Command::Execute(args) => assert_eq!(args.tasks, ["tv-*", "movies"]),
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["feedpipe", "daemon", "reload"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Daemon {
                action: DaemonAction::ReloadConfig
            }
        ));

        let cli = Cli::try_parse_from(["feedpipe", "daemon", "sta", "--autoreload-config"]);
        assert!(cli.is_err(), "`sta` is ambiguous between start and status");

        let cli = Cli::try_parse_from(["feedpipe", "daemon", "star", "-d"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Daemon {
                action: DaemonAction::Start { daemonize: true, .. }
            }
        ));
    }

    #[test]
    fn test_log_levels() {
        let cli = Cli::try_parse_from(["feedpipe", "execute"]).unwrap();
        assert_eq!(cli.effective_loglevel().directive(), "info");

        let cli = Cli::try_parse_from(["feedpipe", "-L", "none", "--debug", "execute"]).unwrap();
        assert_eq!(cli.effective_loglevel(), LogLevel::Debug);

        let cli = Cli::try_parse_from(["feedpipe", "-L", "trace", "--cron", "execute"]).unwrap();
        assert_eq!(cli.effective_loglevel(), LogLevel::Info);

        let cli = Cli::try_parse_from(["feedpipe", "--debug-trace", "execute"]).unwrap();
        assert_eq!(cli.effective_loglevel(), LogLevel::Trace);
    }

    #[test]
    fn test_logfile_defaults_to_config_dir() {
        let cli = Cli::try_parse_from(["feedpipe", "-c", "/etc/feedpipe/config.yml", "execute"]).unwrap();
        assert_eq!(cli.logfile_path(), PathBuf::from("/etc/feedpipe/feedpipe.log"));

        let cli = Cli::try_parse_from(["feedpipe", "-l", "/var/log/fp.log", "execute"]).unwrap();
        assert_eq!(cli.logfile_path(), PathBuf::from("/var/log/fp.log"));

        let cli = Cli::try_parse_from(["feedpipe", "execute"]).unwrap();
        assert_eq!(cli.logfile_path(), PathBuf::from("./feedpipe.log"));
    }
}
