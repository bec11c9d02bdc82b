// # Liquid Template Renderer
//
// Renders Liquid templates with the entry's fields as top-level variables:
//
// ```text
// {{ series_name }} - {{ title | upcase }}
// ```
//
// Every field is resolved before rendering, which means lazy fields are
// evaluated even if the template never mentions them.

use std::sync::OnceLock;

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::traits::TemplateRenderer;
use crate::value::Value;

/// TemplateRenderer backed by the `liquid` crate
#[derive(Default)]
pub struct LiquidRenderer {
    parser: OnceLock<liquid::Parser>,
}

impl LiquidRenderer {
    /// Create a renderer; the parser is built on first use
    pub fn new() -> Self {
        Self::default()
    }

    fn parser(&self) -> Result<&liquid::Parser> {
        if let Some(parser) = self.parser.get() {
            return Ok(parser);
        }
        let parser = liquid::ParserBuilder::with_stdlib()
            .build()
            .map_err(|e| Error::render(format!("failed to build template parser: {e}")))?;
        Ok(self.parser.get_or_init(|| parser))
    }

    fn context(entry: &Entry) -> liquid::Object {
        let mut object = liquid::Object::new();
        for key in entry.keys() {
            let value = entry.get_opt(key).unwrap_or_default();
            object.insert(key.to_string().into(), to_liquid(&value));
        }
        object
    }
}

fn to_liquid(value: &Value) -> liquid::model::Value {
    match value {
        Value::Null => liquid::model::Value::Nil,
        Value::Bool(b) => liquid::model::Value::scalar(*b),
        Value::Int(i) => liquid::model::Value::scalar(*i),
        Value::Float(f) => liquid::model::Value::scalar(*f),
        Value::Text(s) => liquid::model::Value::scalar(s.clone()),
        Value::RawText(b) => liquid::model::Value::scalar(String::from_utf8_lossy(b).into_owned()),
        Value::List(items) => liquid::model::Value::Array(items.iter().map(to_liquid).collect()),
        Value::Map(map) => {
            let mut object = liquid::Object::new();
            for (key, value) in map {
                object.insert(key.clone().into(), to_liquid(value));
            }
            liquid::model::Value::Object(object)
        }
        Value::Object(obj) => liquid::model::Value::scalar(format!("<{}>", obj.type_name())),
    }
}

impl TemplateRenderer for LiquidRenderer {
    fn render(&self, template: &str, entry: &Entry) -> Result<String> {
        let template = self
            .parser()?
            .parse(template)
            .map_err(|e| Error::render(e.to_string()))?;

        template
            .render(&Self::context(entry))
            .map_err(|e| Error::render(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LazyResolver;

    #[test]
    fn test_render_fields() {
        let mut entry = Entry::from_title_url("Show S01E01", "http://example/ep1").unwrap();
        entry.set("quality", "720p").unwrap();

        let renderer = LiquidRenderer::new();
        assert_eq!(
            renderer.render("{{ title }} [{{ quality | upcase }}]", &entry).unwrap(),
            "Show S01E01 [720P]"
        );
    }

    #[test]
    fn test_render_evaluates_lazy_fields() {
        let mut entry = Entry::from_title_url("T", "http://u").unwrap();
        let resolver = LazyResolver::new("series", |_, _| Some(Value::from("Show")));
        entry.register_lazy_fields(["series_name"], &resolver).unwrap();

        assert_eq!(
            LiquidRenderer::new().render("{{ series_name }}", &entry).unwrap(),
            "Show"
        );
    }

    #[test]
    fn test_parse_error_is_render_error() {
        let entry = Entry::new();
        let err = LiquidRenderer::new().render("{% if %}", &entry).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }
}
