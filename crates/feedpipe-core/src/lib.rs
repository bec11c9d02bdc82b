// # feedpipe-core
//
// Core library for the feedpipe feed-processing pipeline.
//
// ## Architecture Overview
//
// - **Entry**: The record that flows through a task; enforces its field
//   invariants on every write
// - **Value**: Dynamically typed field values
// - **Services**: Identifier parser, template renderer, and diagnostic sink
//   an entry delegates to
// - **TaskRunner**: Trait for executing one task over a batch of entries
// - **RunnerRegistry**: Plugin-based registry for task runners
// - **PipelineEngine**: Runs tasks once or on schedules as a daemon
//
// ## Design Principles
//
// 1. **Enforced Writes**: Every mutation of an entry goes through one path
// 2. **Single Writer**: Entries are owned, not shared; `&mut` is the lock
// 3. **Plugin-Based**: Runners are registered by name, no hard-coded match
// 4. **Library-First**: The binary is a thin shell around this crate

pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod registry;
pub mod runner;
pub mod services;
pub mod traits;
pub mod value;

// Re-export core types for convenience
pub use config::{AppConfig, DaemonConfig, IntervalConfig, RunnerConfig, ScheduleConfig, TaskConfig};
pub use engine::{
    inject_entries, DaemonHandle, EngineEvent, ExecuteOptions, ExecutionSummary, PipelineEngine,
};
pub use entry::{Entry, FieldChange, FieldSpec, LazyResolver, Snapshot, TraceEntry};
pub use error::{Error, Result};
pub use registry::RunnerRegistry;
pub use services::EntryServices;
pub use traits::{DiagnosticSink, IdParser, TaskRunner, TemplateRenderer};
pub use value::{OpaqueValue, Value};
