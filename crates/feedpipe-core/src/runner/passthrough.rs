// # Passthrough Runner
//
// Runs a task without any filtering plugins: every valid entry is accepted
// once.
//
// ## Seen Memory
//
// Accepted titles and urls are remembered in memory for the lifetime of the
// runner. An entry whose title or url was seen before is rejected unless
// the run sets `retry`. The memory is not persisted, so a one-shot
// `execute` starts empty and a daemon remembers across scheduled runs.
//
// ## Run Flags
//
// - `learn`: entries are remembered and reported as learned, not accepted
// - `test`: nothing is remembered
// - `nocache`: the memory is neither consulted nor updated
//
// Disabling the `filter` phase skips the seen check; disabling `learn`
// skips remembering.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;
use tracing::debug;

use crate::config::RunnerConfig;
use crate::entry::Entry;
use crate::traits::{Rejection, TaskContext, TaskReport, TaskRunner, TaskRunnerFactory};
use crate::Error;

const PLUGIN: &str = "passthrough";

/// Runner that accepts every valid, unseen entry
///
/// # Example
///
/// ```rust,no_run
/// use feedpipe_core::config::TaskConfig;
/// use feedpipe_core::runner::PassthroughRunner;
/// use feedpipe_core::traits::{TaskContext, TaskRunner};
/// use feedpipe_core::Entry;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let runner = PassthroughRunner::new();
///     let context = TaskContext::new("tv", TaskConfig::new());
///     let entries = vec![Entry::from_title_url("Show S01E01", "http://example/1")?];
///
///     let report = runner.run_task(&context, entries).await?;
///     assert_eq!(report.accepted.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct PassthroughRunner {
    seen: Arc<RwLock<HashSet<String>>>,
}

impl PassthroughRunner {
    /// Create a runner with an empty memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remembered titles and urls
    pub async fn seen_len(&self) -> usize {
        self.seen.read().await.len()
    }

    /// Forget everything
    pub async fn clear(&self) {
        self.seen.write().await.clear();
    }

    fn fingerprints(entry: &Entry) -> Vec<String> {
        ["title", "url"]
            .iter()
            .filter_map(|field| entry.get_opt(field))
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl TaskRunner for PassthroughRunner {
    async fn run_task(
        &self,
        task: &TaskContext,
        entries: Vec<Entry>,
    ) -> Result<TaskReport, Error> {
        let mut report = TaskReport::new(&task.name);
        let check_seen = !task.retry && !task.nocache && task.phase_enabled("filter");
        let remember = !task.test && !task.nocache && task.phase_enabled("learn");

        for mut entry in entries {
            if !entry.is_valid() {
                debug!("[{}] rejecting invalid entry {}", task.name, entry.safe_str());
                entry.add_trace(PLUGIN, "reject", "invalid entry");
                report.rejected.push(Rejection {
                    entry,
                    reason: "invalid entry".to_string(),
                });
                continue;
            }

            let fingerprints = Self::fingerprints(&entry);

            if check_seen {
                let seen = self.seen.read().await;
                if fingerprints.iter().any(|f| seen.contains(f)) {
                    drop(seen);
                    debug!("[{}] rejecting seen entry {}", task.name, entry.safe_str());
                    entry.add_trace(PLUGIN, "reject", "entry already seen");
                    report.rejected.push(Rejection {
                        entry,
                        reason: "entry already seen".to_string(),
                    });
                    continue;
                }
            }

            entry.take_snapshot("input");

            if remember {
                self.seen.write().await.extend(fingerprints);
            }

            if task.learn {
                entry.add_trace(PLUGIN, "learn", "remembered without accepting");
                report.learned.push(entry);
            } else {
                entry.add_trace(PLUGIN, "accept", "passthrough");
                report.accepted.push(entry);
            }
        }

        Ok(report)
    }

    fn runner_name(&self) -> &'static str {
        PLUGIN
    }
}

/// Factory registered under `passthrough`
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRunnerFactory;

impl TaskRunnerFactory for PassthroughRunnerFactory {
    fn create(&self, _config: &RunnerConfig) -> Result<Box<dyn TaskRunner>, Error> {
        Ok(Box::new(PassthroughRunner::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskConfig;

    fn entries() -> Vec<Entry> {
        vec![
            Entry::from_title_url("Show S01E01", "http://example/1").unwrap(),
            Entry::from_title_url("Show S01E02", "http://example/2").unwrap(),
        ]
    }

    fn context() -> TaskContext {
        TaskContext::new("tv", TaskConfig::new())
    }

    #[tokio::test]
    async fn test_accepts_then_rejects_seen() {
        let runner = PassthroughRunner::new();

        let report = runner.run_task(&context(), entries()).await.unwrap();
        assert_eq!(report.accepted.len(), 2);
        assert!(report.accepted[0].snapshot("input").is_some());
        assert_eq!(runner.seen_len().await, 4);

        let report = runner.run_task(&context(), entries()).await.unwrap();
        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].reason, "entry already seen");
    }

    #[tokio::test]
    async fn test_retry_accepts_seen() {
        let runner = PassthroughRunner::new();
        runner.run_task(&context(), entries()).await.unwrap();

        let mut retry = context();
        retry.retry = true;
        let report = runner.run_task(&retry, entries()).await.unwrap();
        assert_eq!(report.accepted.len(), 2);
    }

    #[tokio::test]
    async fn test_learn_and_test_modes() {
        let runner = PassthroughRunner::new();

        let mut test = context();
        test.test = true;
        let report = runner.run_task(&test, entries()).await.unwrap();
        assert_eq!(report.accepted.len(), 2);
        assert_eq!(runner.seen_len().await, 0);

        let mut learn = context();
        learn.learn = true;
        let report = runner.run_task(&learn, entries()).await.unwrap();
        assert!(report.accepted.is_empty());
        assert_eq!(report.learned.len(), 2);

        let report = runner.run_task(&context(), entries()).await.unwrap();
        assert!(report.accepted.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_entries_rejected() {
        let runner = PassthroughRunner::new();
        let mut entry = Entry::new();
        entry.set("title", "no url").unwrap();

        let report = runner.run_task(&context(), vec![entry]).await.unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].entry.trace()[0].operation, "reject");
    }

    #[tokio::test]
    async fn test_disabled_filter_phase_skips_seen_check() {
        let runner = PassthroughRunner::new();
        runner.run_task(&context(), entries()).await.unwrap();

        let mut no_filter = context();
        no_filter.disable_phases = vec!["FILTER".to_string()];
        let report = runner.run_task(&no_filter, entries()).await.unwrap();
        assert_eq!(report.accepted.len(), 2);
    }
}
