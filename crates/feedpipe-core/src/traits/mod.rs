//! Core traits for feedpipe
//!
//! This module defines the abstract interfaces the entry and the engine call into.
//!
//! - [`IdParser`]: Extract and canonicalise identifier-bearing URLs
//! - [`TemplateRenderer`]: Render template strings against an entry
//! - [`DiagnosticSink`]: Receive leveled diagnostics from an entry
//! - [`TaskRunner`]: Execute one task over a batch of entries

pub mod diagnostics;
pub mod id_parser;
pub mod renderer;
pub mod task_runner;

pub use diagnostics::{DiagnosticLevel, DiagnosticSink};
pub use id_parser::IdParser;
pub use renderer::TemplateRenderer;
pub use task_runner::{Rejection, TaskContext, TaskReport, TaskRunner, TaskRunnerFactory};
