// # Template Renderer Trait
//
// Resolves a template string against the fields of an entry. The entry
// passes itself as the context; the renderer decides which fields it reads
// and may trigger lazy evaluation while doing so.
//
// ## Implementations
//
// - Liquid: `services::LiquidRenderer`

use crate::entry::Entry;
use crate::error::Result;

/// Trait for template renderers
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` using `entry` as the variable context
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The rendered text
    /// - `Err(Error::Render)`: If the template fails to parse or render
    fn render(&self, template: &str, entry: &Entry) -> Result<String>;
}
