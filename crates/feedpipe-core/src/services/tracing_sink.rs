// # Tracing Diagnostic Sink
//
// Forwards entry diagnostics to the `tracing` macros under the `entry`
// target, so `RUST_LOG=entry=trace` shows every field write.

use tracing::{debug, trace, warn};

use crate::traits::{DiagnosticLevel, DiagnosticSink};

/// DiagnosticSink backed by `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, level: DiagnosticLevel, message: &str) {
        match level {
            DiagnosticLevel::Trace => trace!(target: "entry", "{}", message),
            DiagnosticLevel::Debug => debug!(target: "entry", "{}", message),
            DiagnosticLevel::Warning => warn!(target: "entry", "{}", message),
        }
    }
}
