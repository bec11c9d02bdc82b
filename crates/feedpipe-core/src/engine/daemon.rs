// # Daemon Mode
//
// Runs tasks on schedules until told to stop.
//
// ## Scheduling
//
// A tick stream wakes the loop every `daemon.tick_secs`. Each schedule whose
// interval has elapsed queues its matching tasks (in priority order,
// skipping tasks already queued). Queued tasks run one at a time. With no
// schedules configured, every task runs hourly.
//
// ## Control
//
// The loop is driven through a `DaemonHandle`, which can be cloned and
// used from any task:
//
// - `status()`: pid, uptime, queue length, schedules
// - `shutdown(wait)`: `wait` drains the queue first; otherwise the queue is
//   dropped and the loop stops once the current task finishes
// - `reload_config()`: re-reads the config file, keeping the old one on error
//
// Commands are served between tasks, never during one.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use globset::GlobMatcher;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::{EngineEvent, ExecuteOptions, PipelineEngine};
use crate::config::{AppConfig, IntervalConfig, ScheduleConfig};
use crate::error::{Error, Result};

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Stand-in deadline when `now + interval` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Requests served by the daemon loop
#[derive(Debug)]
pub enum DaemonCommand {
    /// Report the daemon state
    Status(oneshot::Sender<DaemonStatus>),
    /// Stop the loop
    Shutdown { wait: bool },
    /// Re-read the configuration file
    ReloadConfig(oneshot::Sender<Result<()>>),
}

/// Snapshot of a running daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    /// Process id
    pub pid: u32,
    /// Time since the loop started
    pub uptime: Duration,
    /// Tasks waiting to run
    pub queued: usize,
    /// Active schedules
    pub schedules: Vec<ScheduleStatus>,
}

/// One active schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleStatus {
    /// Task name patterns
    pub tasks: Vec<String>,
    /// Time between runs
    pub interval: Duration,
    /// Time until the next run
    pub next_run_in: Duration,
}

/// Cloneable handle for controlling a running daemon
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    tx: mpsc::Sender<DaemonCommand>,
}

/// Receiving side of a [`DaemonHandle`], consumed by the daemon loop
#[derive(Debug)]
pub struct DaemonControl {
    commands: mpsc::Receiver<DaemonCommand>,
    autoreload: bool,
}

impl DaemonControl {
    /// Reload the configuration whenever the file's modification time changes
    pub fn with_autoreload(mut self, autoreload: bool) -> Self {
        self.autoreload = autoreload;
        self
    }
}

impl DaemonHandle {
    /// Create a connected handle and control pair
    pub fn channel() -> (DaemonHandle, DaemonControl) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        (
            DaemonHandle { tx },
            DaemonControl {
                commands: rx,
                autoreload: false,
            },
        )
    }

    /// Query the daemon state
    pub async fn status(&self) -> Result<DaemonStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(DaemonCommand::Status(reply)).await?;
        rx.await.map_err(|_| not_running())
    }

    /// Ask the daemon to stop
    pub async fn shutdown(&self, wait: bool) -> Result<()> {
        self.send(DaemonCommand::Shutdown { wait }).await
    }

    /// Ask the daemon to re-read its configuration file
    pub async fn reload_config(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(DaemonCommand::ReloadConfig(reply)).await?;
        rx.await.map_err(|_| not_running())?
    }

    async fn send(&self, command: DaemonCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| not_running())
    }
}

fn next_run_after(now: Instant, interval: Duration) -> Instant {
    now.checked_add(interval).unwrap_or_else(|| now + FAR_FUTURE)
}

fn not_running() -> Error {
    Error::daemon_unavailable("There does not appear to be a daemon running.")
}

struct Schedule {
    patterns: Vec<String>,
    matchers: Vec<GlobMatcher>,
    interval: Duration,
    next_run: Instant,
}

impl Schedule {
    fn build_all(config: &AppConfig, now: Instant) -> Result<Vec<Schedule>> {
        let defaults;
        let schedules = if config.schedules.is_empty() {
            defaults = vec![ScheduleConfig::new(vec!["*".to_string()], IntervalConfig::hours(1))];
            &defaults
        } else {
            &config.schedules
        };

        schedules
            .iter()
            .map(|schedule| {
                let interval = schedule.interval.as_duration();
                Ok(Schedule {
                    patterns: schedule.tasks.clone(),
                    matchers: schedule.matchers()?,
                    interval,
                    next_run: next_run_after(now, interval),
                })
            })
            .collect()
    }

    fn status(&self, now: Instant) -> ScheduleStatus {
        ScheduleStatus {
            tasks: self.patterns.clone(),
            interval: self.interval,
            next_run_in: self.next_run.saturating_duration_since(now),
        }
    }
}

impl PipelineEngine {
    /// Run the daemon loop until a shutdown command arrives or every handle
    /// is dropped
    pub async fn run_daemon(&mut self, mut control: DaemonControl) -> Result<()> {
        let started = Instant::now();
        let mut schedules = Schedule::build_all(&self.config, started)?;
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut draining = false;
        let mut last_modified = if control.autoreload {
            self.config_modified()
        } else {
            None
        };

        let mut interval = tokio::time::interval(Duration::from_secs(self.config.daemon.tick_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        info!("Daemon started with {} schedule(s)", schedules.len());
        self.emit_event(EngineEvent::DaemonStarted {
            schedules: schedules.len(),
        });

        let reason = loop {
            if draining && queue.is_empty() {
                break "queue drained";
            }

            tokio::select! {
                biased;

                command = control.commands.recv() => match command {
                    Some(DaemonCommand::Status(reply)) => {
                        let now = Instant::now();
                        let status = DaemonStatus {
                            pid: std::process::id(),
                            uptime: now.duration_since(started),
                            queued: queue.len(),
                            schedules: schedules.iter().map(|s| s.status(now)).collect(),
                        };
                        let _ = reply.send(status);
                    }
                    Some(DaemonCommand::Shutdown { wait: true }) => {
                        info!("Shutdown requested, finishing {} queued task(s)", queue.len());
                        draining = true;
                    }
                    Some(DaemonCommand::Shutdown { wait: false }) => {
                        if !queue.is_empty() {
                            info!("Shutdown requested, dropping {} queued task(s)", queue.len());
                        }
                        queue.clear();
                        break "shutdown requested";
                    }
                    Some(DaemonCommand::ReloadConfig(reply)) => {
                        let result = self.reload_and_reschedule(&mut schedules);
                        let _ = reply.send(result);
                    }
                    None => break "all daemon handles dropped",
                },

                Some(_) = ticks.next(), if !draining => {
                    if control.autoreload {
                        let modified = self.config_modified();
                        if modified.is_some() && modified != last_modified {
                            info!("Config file changed, reloading");
                            last_modified = modified;
                            if let Err(e) = self.reload_and_reschedule(&mut schedules) {
                                warn!("Keeping previous config: {}", e);
                            }
                        }
                    }
                    self.enqueue_due(&mut schedules, &mut queue);
                }

                _ = std::future::ready(()), if !queue.is_empty() => {
                    if let Some(name) = queue.pop_front() {
                        self.run_scheduled(&name).await;
                    }
                }
            }
        };

        info!("Daemon stopped: {}", reason);
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn reload_and_reschedule(&mut self, schedules: &mut Vec<Schedule>) -> Result<()> {
        self.reload_config()?;
        *schedules = Schedule::build_all(&self.config, Instant::now())?;
        Ok(())
    }

    fn enqueue_due(&self, schedules: &mut [Schedule], queue: &mut VecDeque<String>) {
        let now = Instant::now();
        for schedule in schedules.iter_mut().filter(|s| s.next_run <= now) {
            schedule.next_run = next_run_after(now, schedule.interval);
            for (name, _) in self.select_matching(&schedule.matchers) {
                if queue.contains(&name) {
                    debug!("Task {} is already queued", name);
                    continue;
                }
                debug!("Queueing task {}", name);
                self.emit_event(EngineEvent::TaskQueued { task: name.clone() });
                queue.push_back(name);
            }
        }
    }

    async fn run_scheduled(&self, name: &str) {
        let Some(task) = self.config.tasks.get(name).cloned() else {
            warn!("Task {} is no longer configured, skipping", name);
            return;
        };
        // Failures are already logged and emitted by run_task.
        let _ = self.run_task(name, &task, &ExecuteOptions::default()).await;
    }

    fn config_modified(&self) -> Option<SystemTime> {
        let path = self.config_path.as_ref()?;
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}
