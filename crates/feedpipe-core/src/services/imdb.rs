// # IMDb Identifier Parser
//
// Recognises IMDb title (`tt`) and name (`nm`) identifiers of 7 or 8
// digits anywhere in a string, e.g.
//
// - `http://www.imdb.com/title/tt0133093/?ref_=fn_al_tt_1`
// - `imdb.com/title/tt10872600`
//
// and builds the canonical `https://www.imdb.com/title/<id>/` URL.

use regex::Regex;
use std::sync::OnceLock;

use crate::traits::IdParser;

fn imdb_id_re() -> &'static Regex {
    static IMDB_ID_RE: OnceLock<Regex> = OnceLock::new();
    IMDB_ID_RE.get_or_init(|| Regex::new(r"(?:nm|tt)\d{7,8}").expect("valid imdb id regex"))
}

/// IdParser for IMDb URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct ImdbIdParser;

impl IdParser for ImdbIdParser {
    fn extract_id(&self, url: &str) -> Option<String> {
        imdb_id_re().find(url).map(|m| m.as_str().to_string())
    }

    fn build_url(&self, id: &str) -> String {
        format!("https://www.imdb.com/title/{id}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_id() {
        let parser = ImdbIdParser;
        assert_eq!(
            parser.extract_id("http://www.imdb.com/title/tt0133093/?ref_=fn_al_tt_1"),
            Some("tt0133093".to_string())
        );
        assert_eq!(
            parser.extract_id("imdb.com/title/tt10872600"),
            Some("tt10872600".to_string())
        );
        assert_eq!(parser.extract_id("https://www.imdb.com/name/nm0000206/"), Some("nm0000206".to_string()));
        assert_eq!(parser.extract_id("not-a-valid-imdb-link"), None);
        assert_eq!(parser.extract_id("tt123"), None);
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            ImdbIdParser.build_url("tt0133093"),
            "https://www.imdb.com/title/tt0133093/"
        );
    }
}
