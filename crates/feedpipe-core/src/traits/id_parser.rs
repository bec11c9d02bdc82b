// # Identifier Parser Trait
//
// Used by the entry write path to canonicalise `imdb_url`. A value that
// carries a recognised identifier is rewritten to the URL built from that
// identifier; anything else is dropped.
//
// ## Implementations
//
// - IMDb: `services::ImdbIdParser`

/// Trait for identifier-bearing URL parsers
pub trait IdParser: Send + Sync {
    /// Extract the identifier from a URL, if one is present
    fn extract_id(&self, url: &str) -> Option<String>;

    /// Build the canonical URL for an identifier
    fn build_url(&self, id: &str) -> String;
}
