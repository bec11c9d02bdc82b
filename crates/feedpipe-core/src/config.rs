//! Configuration types for feedpipe
//!
//! This module defines all configuration structures used throughout the crate.
//! Configuration is read from a YAML file:
//!
//! ```yaml
//! tasks:
//!   tv-shows:
//!     priority: 10
//!     mock:
//!       - title: Show S01E01
//!         url: http://example/ep1
//! schedules:
//!   - tasks: ["tv-*"]
//!     interval:
//!       minutes: 30
//! ```

use globset::{Glob, GlobBuilder, GlobMatcher};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::entry::Entry;
use crate::error::{Error, Result};

/// Main feedpipe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tasks by name
    #[serde(default)]
    pub tasks: IndexMap<String, TaskConfig>,

    /// Daemon schedules; empty means every task runs hourly
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,

    /// Which runner executes tasks
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl AppConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Read, parse, and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(text)
            .map_err(|e| Error::config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Add a task
    pub fn with_task(mut self, name: impl Into<String>, task: TaskConfig) -> Self {
        self.tasks.insert(name.into(), task);
        self
    }

    /// Add a schedule
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedules.push(schedule);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(Error::config("No tasks configured"));
        }

        for (name, task) in &self.tasks {
            if name.trim().is_empty() {
                return Err(Error::config("Task names cannot be empty"));
            }
            task.validate(name)?;
        }

        for (index, schedule) in self.schedules.iter().enumerate() {
            schedule.validate(index)?;
            let matchers = schedule.matchers()?;
            if !self.tasks.keys().any(|name| matchers.iter().any(|m| m.is_match(name))) {
                return Err(Error::config(format!(
                    "Schedule #{index} ({}) does not match any configured task",
                    schedule.tasks.join(", ")
                )));
            }
        }

        self.daemon.validate()?;

        Ok(())
    }
}

/// Configuration of a single task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Lower runs first
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Disabled tasks are never selected
    #[serde(default)]
    pub disabled: bool,

    /// Literal input entries
    #[serde(default)]
    pub mock: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            disabled: false,
            mock: Vec::new(),
        }
    }
}

impl TaskConfig {
    /// Create a task configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable the task
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Add a mock input entry
    pub fn with_mock(mut self, title: &str, url: &str) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("title".to_string(), title.into());
        fields.insert("url".to_string(), url.into());
        self.mock.push(fields);
        self
    }

    /// Build entries from the mock inputs
    pub fn mock_entries(&self) -> Result<Vec<Entry>> {
        self.mock
            .iter()
            .map(|fields| {
                Entry::from_fields(
                    fields
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone())),
                )
            })
            .collect()
    }

    fn validate(&self, name: &str) -> Result<()> {
        self.mock_entries()
            .map_err(|e| Error::config(format!("Task {name}: invalid mock entry: {e}")))?;
        Ok(())
    }
}

fn default_priority() -> i32 {
    65535
}

/// When the daemon runs which tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Task name patterns (case-insensitive globs)
    pub tasks: Vec<String>,

    /// Time between runs
    pub interval: IntervalConfig,
}

impl ScheduleConfig {
    /// Create a schedule
    pub fn new(tasks: Vec<String>, interval: IntervalConfig) -> Self {
        Self { tasks, interval }
    }

    /// Compile the task patterns
    pub fn matchers(&self) -> Result<Vec<GlobMatcher>> {
        compile_patterns(&self.tasks)
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(Error::config(format!("Schedule #{index} lists no tasks")));
        }
        let interval = self.interval.as_duration();
        if interval.is_zero() {
            return Err(Error::config(format!("Schedule #{index} interval must be > 0")));
        }
        if interval > MAX_INTERVAL {
            return Err(Error::config(format!(
                "Schedule #{index} interval must not exceed {} weeks",
                MAX_INTERVAL.as_secs() / WEEK_SECS
            )));
        }
        Ok(())
    }
}

const WEEK_SECS: u64 = 7 * 24 * 3600;

/// Longest accepted schedule interval (about 100 years)
pub const MAX_INTERVAL: Duration = Duration::from_secs(5200 * WEEK_SECS);

/// A schedule interval, summed over all units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalConfig {
    #[serde(default)]
    pub weeks: u64,
    #[serde(default)]
    pub days: u64,
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
}

impl IntervalConfig {
    /// Interval of whole hours
    pub fn hours(hours: u64) -> Self {
        Self {
            hours,
            ..Self::default()
        }
    }

    /// Interval of whole minutes
    pub fn minutes(minutes: u64) -> Self {
        Self {
            minutes,
            ..Self::default()
        }
    }

    /// Interval of whole seconds
    pub fn seconds(seconds: u64) -> Self {
        Self {
            seconds,
            ..Self::default()
        }
    }

    /// Total length
    pub fn as_duration(&self) -> Duration {
        let secs = self
            .weeks
            .saturating_mul(WEEK_SECS)
            .saturating_add(self.days.saturating_mul(24 * 3600))
            .saturating_add(self.hours.saturating_mul(3600))
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds);
        Duration::from_secs(secs)
    }
}

/// Task runner selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Registered runner type
    #[serde(rename = "type", default = "default_runner_type")]
    pub runner_type: String,

    /// Runner-specific options
    #[serde(default)]
    pub options: serde_json::Value,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runner_type: default_runner_type(),
            options: serde_json::Value::Null,
        }
    }
}

impl RunnerConfig {
    /// Get the runner type name
    pub fn type_name(&self) -> &str {
        &self.runner_type
    }
}

fn default_runner_type() -> String {
    "passthrough".to_string()
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// How often schedules are checked (in seconds)
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl DaemonConfig {
    fn validate(&self) -> Result<()> {
        if self.tick_secs == 0 {
            return Err(Error::config("daemon.tick_secs must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("daemon.event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

fn default_tick_secs() -> u64 {
    1
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Compile case-insensitive task name patterns
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<GlobMatcher>> {
    patterns
        .iter()
        .map(|pattern| {
            GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|glob: Glob| glob.compile_matcher())
                .map_err(|e| Error::config(format!("Invalid task pattern '{pattern}': {e}")))
        })
        .collect()
}
