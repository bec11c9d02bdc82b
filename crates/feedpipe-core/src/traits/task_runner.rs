// # Task Runner Trait
//
// Defines the pipeline execution call the engine hands entries to.
//
// ## Implementations
//
// - Passthrough: `runner::PassthroughRunner`
// - Future: plugin-driven phase execution
//
// ## Usage
//
// ```rust,ignore
// use feedpipe_core::TaskRunner;
//
// let report = runner.run_task(&context, entries).await?;
// println!("{} accepted", report.accepted.len());
// ```

use async_trait::async_trait;

use crate::config::{RunnerConfig, TaskConfig};
use crate::entry::Entry;

/// Everything a runner needs to know about the task it is executing
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Task name as configured
    pub name: String,
    /// Task configuration
    pub config: TaskConfig,
    /// Mark matches as seen without accepting them
    pub learn: bool,
    /// Report what would happen without remembering anything
    pub test: bool,
    /// Accept entries again even if they were accepted before
    pub retry: bool,
    /// Bypass runner caches
    pub nocache: bool,
    /// Pipeline phases that must not run
    pub disable_phases: Vec<String>,
}

impl TaskContext {
    /// Create a context with default flags
    pub fn new(name: impl Into<String>, config: TaskConfig) -> Self {
        Self {
            name: name.into(),
            config,
            learn: false,
            test: false,
            retry: false,
            nocache: false,
            disable_phases: Vec::new(),
        }
    }

    /// Check whether a phase has been disabled for this run
    pub fn phase_enabled(&self, phase: &str) -> bool {
        !self
            .disable_phases
            .iter()
            .any(|p| p.eq_ignore_ascii_case(phase))
    }
}

/// An entry the runner refused, with the reason
#[derive(Debug, Clone)]
pub struct Rejection {
    /// The rejected entry
    pub entry: Entry,
    /// Why it was rejected
    pub reason: String,
}

/// Outcome of running one task
#[derive(Debug, Clone, Default)]
pub struct TaskReport {
    /// Task name
    pub task: String,
    /// Entries accepted by the task
    pub accepted: Vec<Entry>,
    /// Entries rejected by the task
    pub rejected: Vec<Rejection>,
    /// Entries remembered without being accepted (learn mode)
    pub learned: Vec<Entry>,
}

impl TaskReport {
    /// Create an empty report for a task
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }
}

/// Trait for task runner implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe; the daemon holds a runner for its
/// whole lifetime and calls it from the engine task.
///
/// # Ownership
///
/// The runner receives the entries by value. During `run_task` it is the
/// single owner of every entry it was given, which is what allows entries
/// to be mutated without locking.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Execute a task over a batch of entries
    ///
    /// # Returns
    ///
    /// - `Ok(TaskReport)`: What happened to each entry
    /// - `Err(Error)`: If the task aborted
    async fn run_task(
        &self,
        task: &TaskContext,
        entries: Vec<Entry>,
    ) -> Result<TaskReport, crate::Error>;

    /// Get the runner name (for logging/debugging)
    fn runner_name(&self) -> &'static str;
}

/// Helper trait for constructing task runners from configuration
pub trait TaskRunnerFactory: Send + Sync {
    /// Create a TaskRunner instance from configuration
    fn create(&self, config: &RunnerConfig) -> Result<Box<dyn TaskRunner>, crate::Error>;
}
