//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that observe what the entry
//! and the engine do without implementing real functionality.

#![allow(dead_code)]

use feedpipe_core::config::{AppConfig, TaskConfig};
use feedpipe_core::entry::{Entry, LazyResolver};
use feedpipe_core::services::EntryServices;
use feedpipe_core::traits::{DiagnosticLevel, DiagnosticSink, TaskContext, TaskReport, TaskRunner};
use feedpipe_core::value::Value;
use feedpipe_core::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A diagnostic sink that records every message
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(DiagnosticLevel, String)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All recorded messages at `level`
    pub fn at(&self, level: DiagnosticLevel) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Number of recorded warnings
    pub fn warnings(&self) -> usize {
        self.at(DiagnosticLevel::Warning).len()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, level: DiagnosticLevel, message: &str) {
        self.messages.lock().unwrap().push((level, message.to_string()));
    }
}

/// Entry whose diagnostics go to `sink`
pub fn recorded_entry(sink: &Arc<RecordingSink>) -> Entry {
    let services = EntryServices::new().with_diagnostics(sink.clone());
    Entry::with_services(Arc::new(services))
}

/// A resolver that counts its invocations and always returns `value`
pub fn counting_resolver(name: &str, value: Option<Value>) -> (LazyResolver, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let resolver = LazyResolver::new(name, move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        value.clone()
    });
    (resolver, calls)
}

/// A runner that records which tasks ran and can be told to fail some
#[derive(Clone, Default)]
pub struct RecordingRunner {
    runs: Arc<Mutex<Vec<(String, Vec<Entry>)>>>,
    fail: Arc<Mutex<Vec<String>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every run of `task` fail
    pub fn failing(self, task: &str) -> Self {
        self.fail.lock().unwrap().push(task.to_string());
        self
    }

    /// Task names in run order
    pub fn task_names(&self) -> Vec<String> {
        self.runs.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Entries handed to the n-th run
    pub fn entries_of(&self, run: usize) -> Vec<Entry> {
        self.runs.lock().unwrap()[run].1.clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TaskRunner for RecordingRunner {
    async fn run_task(&self, task: &TaskContext, entries: Vec<Entry>) -> Result<TaskReport, Error> {
        self.runs
            .lock()
            .unwrap()
            .push((task.name.clone(), entries.clone()));

        if self.fail.lock().unwrap().contains(&task.name) {
            return Err(Error::runner("recording", format!("{} failed on purpose", task.name)));
        }

        let mut report = TaskReport::new(&task.name);
        report.accepted = entries;
        Ok(report)
    }

    fn runner_name(&self) -> &'static str {
        "recording"
    }
}

/// A config with one mock entry per task
pub fn minimal_config(tasks: &[&str]) -> AppConfig {
    tasks.iter().fold(AppConfig::new(), |config, name| {
        config.with_task(
            *name,
            TaskConfig::new().with_mock(&format!("{name} item"), &format!("http://example/{name}")),
        )
    })
}

/// Write `yaml` to a config file inside `dir`
pub fn write_config(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("config.yml");
    std::fs::write(&path, yaml).unwrap();
    path
}
