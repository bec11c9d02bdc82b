// # Diagnostic Sink Trait
//
// Entries report what they do (field writes, skipped snapshot fields,
// rejected identifiers) through an injected sink instead of a process-wide
// logger. The default sink forwards to `tracing`.
//
// ## Contract
//
// - `emit` must not panic and must not fail; diagnostics are best-effort.
// - Ordering of calls is the order in which the entry produced them.

use std::fmt;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    /// Per-field write tracing
    Trace,
    /// Developer-facing detail
    Debug,
    /// Something was skipped or overwritten
    Warning,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Trace => write!(f, "TRACE"),
            DiagnosticLevel::Debug => write!(f, "DEBUG"),
            DiagnosticLevel::Warning => write!(f, "WARNING"),
        }
    }
}

/// Trait for diagnostic sinks
///
/// Implementations must be thread-safe so a single sink can be shared by
/// every entry in a pipeline run.
pub trait DiagnosticSink: Send + Sync {
    /// Record one message
    fn emit(&self, level: DiagnosticLevel, message: &str);

    /// Record a trace message
    fn trace(&self, message: &str) {
        self.emit(DiagnosticLevel::Trace, message);
    }

    /// Record a debug message
    fn debug(&self, message: &str) {
        self.emit(DiagnosticLevel::Debug, message);
    }

    /// Record a warning
    fn warning(&self, message: &str) {
        self.emit(DiagnosticLevel::Warning, message);
    }
}
