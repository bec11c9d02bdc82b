// # Entry Services
//
// Built-in implementations of the traits an entry calls into, and the
// bundle that carries them.
//
// Every entry holds an `Arc<EntryServices>`. Entries created with
// `Entry::new()` share one process-wide default bundle; callers that need a
// different parser, renderer, or sink build their own bundle and use
// `Entry::with_services`.

pub mod imdb;
pub mod template;
pub mod tracing_sink;

pub use imdb::ImdbIdParser;
pub use template::LiquidRenderer;
pub use tracing_sink::TracingSink;

use std::sync::{Arc, OnceLock};

use crate::traits::{DiagnosticSink, IdParser, TemplateRenderer};

/// Collaborators an entry delegates to
#[derive(Clone)]
pub struct EntryServices {
    /// Canonicalises `imdb_url`
    pub id_parser: Arc<dyn IdParser>,
    /// Renders templates against the entry
    pub renderer: Arc<dyn TemplateRenderer>,
    /// Receives write traces and warnings
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl EntryServices {
    /// Create a bundle of the built-in services
    pub fn new() -> Self {
        Self {
            id_parser: Arc::new(ImdbIdParser),
            renderer: Arc::new(LiquidRenderer::new()),
            diagnostics: Arc::new(TracingSink),
        }
    }

    /// The process-wide default bundle
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<EntryServices>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(EntryServices::new())))
    }

    /// Replace the identifier parser
    pub fn with_id_parser(mut self, id_parser: Arc<dyn IdParser>) -> Self {
        self.id_parser = id_parser;
        self
    }

    /// Replace the template renderer
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the diagnostic sink
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl Default for EntryServices {
    fn default() -> Self {
        Self::new()
    }
}
