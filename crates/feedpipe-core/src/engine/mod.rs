//! Core pipeline engine
//!
//! The PipelineEngine is responsible for:
//! - Selecting tasks from configuration
//! - Building each task's input entries (mock inputs or injected entries)
//! - Handing entries to the configured TaskRunner
//! - Running tasks on schedules in daemon mode
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────────┐     ┌──────────────┐
//! │  AppConfig  │────▶│ PipelineEngine │────▶│  TaskRunner  │
//! └─────────────┘     └────────────────┘     └──────────────┘
//!                             │
//!                             ▼
//!                     ┌──────────────┐
//!                     │    Events    │
//!                     │   (notify)   │
//!                     └──────────────┘
//! ```
//!
//! ## Execution Flow
//!
//! 1. Match task names against the requested patterns
//! 2. Order the selection by priority, then name
//! 3. Run each task in turn; a failing task does not stop the others
//! 4. Emit events for monitoring/logging

mod daemon;

pub use daemon::{DaemonCommand, DaemonControl, DaemonHandle, DaemonStatus, ScheduleStatus};

use std::path::{Path, PathBuf};

use globset::GlobMatcher;
use rand::seq::index::sample;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{compile_patterns, AppConfig, TaskConfig};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::traits::{TaskContext, TaskReport, TaskRunner};

/// Events emitted by the PipelineEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Task about to run
    TaskStarted {
        task: String,
        entries: usize,
    },

    /// Task finished
    TaskCompleted {
        task: String,
        accepted: usize,
        rejected: usize,
        learned: usize,
    },

    /// Task aborted
    TaskFailed {
        task: String,
        error: String,
    },

    /// Task added to the daemon queue
    TaskQueued {
        task: String,
    },

    /// Configuration re-read from disk
    ConfigReloaded,

    /// Configuration could not be re-read; the previous one stays active
    ConfigReloadFailed {
        error: String,
    },

    /// Daemon loop started
    DaemonStarted {
        schedules: usize,
    },

    /// Daemon loop stopped
    Stopped {
        reason: String,
    },
}

/// Options of a one-shot execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Task name patterns; empty selects every task
    pub tasks: Vec<String>,
    /// Remember matches without accepting them
    pub learn: bool,
    /// Phases that must not run
    pub disable_phases: Vec<String>,
    /// Entries that replace every selected task's inputs
    pub inject: Vec<Entry>,
    /// Accept previously accepted entries again
    pub retry: bool,
    /// Bypass runner caches
    pub nocache: bool,
    /// Do not remember anything
    pub test: bool,
}

impl ExecuteOptions {
    fn context(&self, name: &str, config: &TaskConfig) -> TaskContext {
        TaskContext {
            name: name.to_string(),
            config: config.clone(),
            learn: self.learn,
            test: self.test,
            retry: self.retry,
            nocache: self.nocache,
            disable_phases: self.disable_phases.clone(),
        }
    }
}

/// A task that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub error: String,
}

/// Outcome of [`PipelineEngine::execute`]
#[derive(Debug, Clone, Default)]
pub struct ExecutionSummary {
    /// Reports of the tasks that completed, in run order
    pub reports: Vec<TaskReport>,
    /// Tasks that failed
    pub failures: Vec<TaskFailure>,
}

impl ExecutionSummary {
    /// True if every selected task completed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total accepted entries across all tasks
    pub fn accepted(&self) -> usize {
        self.reports.iter().map(|r| r.accepted.len()).sum()
    }

    /// Names of the tasks that ran, in order
    pub fn task_names(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.task.as_str()).collect()
    }
}

/// Core pipeline engine
///
/// ## Lifecycle
///
/// 1. Create with [`PipelineEngine::new()`]
/// 2. Either [`execute`](PipelineEngine::execute) once, or
///    [`run_daemon`](PipelineEngine::run_daemon) until told to stop
///
/// ## Load Resistance
///
/// Events go through a bounded channel. When it is full, new events are
/// dropped with a warning instead of growing memory.
pub struct PipelineEngine {
    /// Runner that executes tasks
    runner: Box<dyn TaskRunner>,

    /// Active configuration
    config: AppConfig,

    /// File the configuration is reloaded from
    config_path: Option<PathBuf>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl PipelineEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        runner: Box<dyn TaskRunner>,
        config: AppConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.daemon.event_channel_capacity);

        let engine = Self {
            runner,
            config,
            config_path: None,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Remember the file the configuration came from, enabling reloads
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Active configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// File the configuration is reloaded from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Re-read the configuration file
    ///
    /// On failure the current configuration stays active.
    pub fn reload_config(&mut self) -> Result<()> {
        let path = self
            .config_path
            .clone()
            .ok_or_else(|| Error::config("No config file to reload from"))?;

        match AppConfig::load(&path) {
            Ok(config) => {
                if config.runner.type_name() != self.config.runner.type_name() {
                    warn!(
                        "Runner type changed from {} to {}; restart to switch runners",
                        self.config.runner.type_name(),
                        config.runner.type_name()
                    );
                }
                self.config = config;
                info!("Config successfully reloaded from disk.");
                self.emit_event(EngineEvent::ConfigReloaded);
                Ok(())
            }
            Err(e) => {
                error!("Error loading config: {}", e);
                self.emit_event(EngineEvent::ConfigReloadFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Resolve task name patterns to the tasks that should run
    ///
    /// Patterns are case-insensitive globs; no patterns selects everything.
    /// Disabled tasks are never selected. The result is ordered by
    /// priority, then name.
    pub fn select_tasks(&self, patterns: &[String]) -> Result<Vec<(String, TaskConfig)>> {
        let matchers = compile_patterns(patterns)?;
        Ok(self.select_matching(&matchers))
    }

    /// Select with already compiled patterns
    pub(crate) fn select_matching(&self, matchers: &[GlobMatcher]) -> Vec<(String, TaskConfig)> {
        let mut selected: Vec<(String, TaskConfig)> = self
            .config
            .tasks
            .iter()
            .filter(|(name, _)| matchers.is_empty() || matchers.iter().any(|m| m.is_match(name.as_str())))
            .filter(|(name, task)| {
                if task.disabled {
                    debug!("Task {} is disabled, skipping", name);
                }
                !task.disabled
            })
            .map(|(name, task)| (name.clone(), task.clone()))
            .collect();

        selected.sort_by(|(a_name, a), (b_name, b)| {
            a.priority.cmp(&b.priority).then_with(|| a_name.cmp(b_name))
        });

        selected
    }

    /// Run the selected tasks once, one after another
    ///
    /// A task failure is logged and recorded in the summary; remaining
    /// tasks still run.
    pub async fn execute(&self, options: &ExecuteOptions) -> Result<ExecutionSummary> {
        let selected = self.select_tasks(&options.tasks)?;
        if selected.is_empty() {
            warn!("No tasks matched {:?}", options.tasks);
        }

        let mut summary = ExecutionSummary::default();
        for (name, task) in &selected {
            match self.run_task(name, task, options).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => summary.failures.push(TaskFailure {
                    task: name.clone(),
                    error: e.to_string(),
                }),
            }
        }

        info!(
            "Execution finished: {} task(s) completed, {} failed, {} entries accepted",
            summary.reports.len(),
            summary.failures.len(),
            summary.accepted()
        );
        Ok(summary)
    }

    /// Run a single task
    async fn run_task(
        &self,
        name: &str,
        task: &TaskConfig,
        options: &ExecuteOptions,
    ) -> Result<TaskReport> {
        let entries = if options.inject.is_empty() {
            task.mock_entries()
        } else {
            Ok(options.inject.clone())
        };

        let entries = match entries {
            Ok(entries) => entries,
            Err(e) => {
                error!("Task {} failed to build its inputs: {}", name, e);
                self.emit_event(EngineEvent::TaskFailed {
                    task: name.to_string(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        self.emit_event(EngineEvent::TaskStarted {
            task: name.to_string(),
            entries: entries.len(),
        });
        debug!("Running task {} with {} entries via {}", name, entries.len(), self.runner.runner_name());

        let context = options.context(name, task);
        match self.runner.run_task(&context, entries).await {
            Ok(report) => {
                info!(
                    "Task {}: {} accepted, {} rejected, {} learned",
                    name,
                    report.accepted.len(),
                    report.rejected.len(),
                    report.learned.len()
                );
                for entry in &report.accepted {
                    debug!("[{}] accepted {}", name, entry);
                }
                self.emit_event(EngineEvent::TaskCompleted {
                    task: name.to_string(),
                    accepted: report.accepted.len(),
                    rejected: report.rejected.len(),
                    learned: report.learned.len(),
                });
                Ok(report)
            }
            Err(e) => {
                error!("Task {} failed: {}", name, e);
                self.emit_event(EngineEvent::TaskFailed {
                    task: name.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing daemon.event_channel_capacity.");
        }
    }
}

const INJECT_URL_PREFIX: &str = "http://localhost/inject/";
const INJECT_ID_LEN: usize = 30;
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Build one entry per title for injection into a run
///
/// Each entry gets a unique placeholder url made of 30 distinct random
/// alphanumeric characters.
pub fn inject_entries<I, S>(titles: I) -> Result<Vec<Entry>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut rng = rand::rng();
    titles
        .into_iter()
        .map(|title| {
            let id: String = sample(&mut rng, ALPHANUMERIC.len(), INJECT_ID_LEN)
                .into_iter()
                .map(|i| ALPHANUMERIC[i] as char)
                .collect();
            Entry::from_title_url(title.as_ref(), format!("{INJECT_URL_PREFIX}{id}"))
        })
        .collect()
}
