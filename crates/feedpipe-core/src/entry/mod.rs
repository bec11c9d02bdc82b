//! The pipeline record
//!
//! An [`Entry`] is one item flowing through a task: an ordered mapping from
//! field name to [`Value`], plus lazily computed fields, a trace log, and
//! named snapshots.
//!
//! ## Write enforcement
//!
//! Every mutation goes through [`Entry::set`] (or the internal slot write it
//! wraps). Bulk updates, defaults, construction, lazy registration and
//! snapshot rollback are all expressed in terms of it, so the following
//! always hold:
//!
//! - Text is stored canonically; undecodable text is rejected with
//!   [`Error::Encoding`] and the entry is left untouched.
//! - `url` and `title` only ever hold text.
//! - The first `url` written is kept in `original_url`, which later `url`
//!   writes never replace.
//! - `imdb_url` is either a canonical URL or null.
//!
//! ## Lazy fields
//!
//! A lazy field is re-evaluated on every read. Reads never write the result
//! back; call [`Entry::set`] with the evaluated value to pin it.
//!
//! ## Ownership
//!
//! Entries have no interior locking. A pipeline stage that holds an entry
//! by `&mut` is its only writer; the type system enforces the
//! single-writer discipline the pipeline relies on.

mod field_map;
mod lazy;
mod snapshot;

pub use field_map::{FieldMapFn, FieldSpec};
pub use lazy::{LazyField, LazyResolver};
pub use snapshot::{FieldChange, Snapshot};

use indexmap::IndexMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::services::EntryServices;
use crate::value::Value;

/// Placeholder printed for a missing title or url
const MISSING: &str = "<missing>";

/// Stored state of one field
#[derive(Clone)]
pub(crate) enum FieldSlot {
    Concrete(Value),
    Lazy(LazyField),
}

impl fmt::Debug for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSlot::Concrete(value) => fmt::Debug::fmt(value, f),
            FieldSlot::Lazy(lazy) => fmt::Debug::fmt(lazy, f),
        }
    }
}

/// A diagnostic line recorded on an entry by a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Plugin or stage that recorded the line
    pub plugin: String,
    /// Operation being performed (e.g. "accept", "reject")
    pub operation: String,
    /// Free-form message
    pub message: String,
}

/// One item in a feed
///
/// Must have `title` and `url` to be [valid](Entry::is_valid).
#[derive(Clone)]
pub struct Entry {
    fields: IndexMap<String, FieldSlot>,
    trace: Vec<TraceEntry>,
    snapshots: IndexMap<String, Snapshot>,
    services: Arc<EntryServices>,
}

impl Entry {
    /// Create an empty entry using the shared default services
    pub fn new() -> Self {
        Self::with_services(EntryServices::shared())
    }

    /// Create an empty entry that reports to and renders with `services`
    pub fn with_services(services: Arc<EntryServices>) -> Self {
        Self {
            fields: IndexMap::new(),
            trace: Vec::new(),
            snapshots: IndexMap::new(),
            services,
        }
    }

    /// Create an entry with a title and url
    pub fn from_title_url(title: impl Into<Value>, url: impl Into<Value>) -> Result<Self> {
        let mut entry = Self::new();
        entry.set("title", title)?;
        entry.set("url", url)?;
        Ok(entry)
    }

    /// Create an entry from key/value pairs
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut entry = Self::new();
        entry.update(fields)?;
        Ok(entry)
    }

    /// Dynamic constructor
    ///
    /// Exactly two positional values are taken as title and url. Otherwise
    /// the arguments are handled like [`Entry::update_from_args`].
    pub fn from_args(args: Vec<Value>, mut kwargs: IndexMap<String, Value>) -> Result<Self> {
        let mut entry = Self::new();
        if args.len() == 2 {
            let mut args = args.into_iter();
            if let (Some(title), Some(url)) = (args.next(), args.next()) {
                kwargs.insert("title".to_string(), title);
                kwargs.insert("url".to_string(), url);
            }
            entry.update_from_args(Vec::new(), kwargs)?;
        } else {
            entry.update_from_args(args, kwargs)?;
        }
        Ok(entry)
    }

    /// Services this entry reports to
    pub fn services(&self) -> &EntryServices {
        &self.services
    }

    /// Set a field through the enforced write path
    ///
    /// # Errors
    ///
    /// - [`Error::Encoding`] if `value` is text that cannot be decoded
    /// - [`Error::InvalidField`] if `url` or `title` is not text
    ///
    /// On error the entry is unchanged.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.write(key.into(), FieldSlot::Concrete(value.into()))
    }

    fn write(&mut self, key: String, slot: FieldSlot) -> Result<()> {
        let slot = match slot {
            FieldSlot::Concrete(value) => FieldSlot::Concrete(
                value
                    .into_canonical()
                    .map_err(|raw| Error::encoding(&key, format!("{raw:?}")))?,
            ),
            lazy => lazy,
        };

        if key == "url" || key == "title" {
            if !matches!(slot, FieldSlot::Concrete(Value::Text(_))) {
                return Err(Error::invalid_field(&key, format!("{slot:?}")));
            }
            if key == "url" && !self.contains("original_url") {
                self.write("original_url".to_string(), slot.clone())?;
            }
        }

        let slot = match slot {
            FieldSlot::Concrete(Value::Text(url)) if key == "imdb_url" => {
                FieldSlot::Concrete(self.canonical_imdb_url(url))
            }
            other => other,
        };

        self.trace_write(&key, &slot);
        self.fields.insert(key, slot);
        Ok(())
    }

    fn canonical_imdb_url(&self, url: String) -> Value {
        let parser = &self.services.id_parser;
        match parser.extract_id(&url) {
            Some(id) => Value::Text(parser.build_url(&id)),
            None => {
                self.services
                    .diagnostics
                    .debug(&format!("Tried to set imdb_url to invalid imdb url: {url}"));
                Value::Null
            }
        }
    }

    fn trace_write(&self, key: &str, slot: &FieldSlot) {
        let mut line = String::new();
        match write!(line, "ENTRY SET: {key} = {slot:?}") {
            Ok(()) => self.services.diagnostics.trace(&line),
            Err(e) => self
                .services
                .diagnostics
                .debug(&format!("trying to debug key `{key}` value threw exception: {e}")),
        }
    }

    /// Set every pair through the enforced write path, in iteration order
    ///
    /// Stops at the first failing write; earlier writes are kept.
    pub fn update<I, K, V>(&mut self, other: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in other {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Dynamically-typed bulk update
    ///
    /// Accepts at most one positional source, which must be a map or a list
    /// of `[key, value]` pairs, followed by keyword pairs.
    pub fn update_from_args(&mut self, args: Vec<Value>, kwargs: IndexMap<String, Value>) -> Result<()> {
        if args.len() > 1 {
            return Err(Error::argument(format!(
                "update expected at most 1 arguments, got {}",
                args.len()
            )));
        }
        if let Some(source) = args.into_iter().next() {
            let pairs = pairs_from(source)?;
            self.update(pairs)?;
        }
        self.update(kwargs)
    }

    /// Set `key` to `value` unless it is already present, then return its value
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Value> {
        let key = key.into();
        if !self.contains(&key) {
            self.set(key.clone(), value)?;
        }
        self.get(&key)
    }

    /// Read a field, evaluating it if lazy
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if the field does not exist.
    pub fn get(&self, key: &str) -> Result<Value> {
        match self.fields.get(key) {
            Some(FieldSlot::Concrete(value)) => Ok(value.clone()),
            Some(FieldSlot::Lazy(lazy)) => {
                self.services
                    .diagnostics
                    .trace(&format!("evaluating lazy field {key}"));
                Ok(lazy.evaluate(self))
            }
            None => Err(Error::key_not_found(key)),
        }
    }

    /// Read a field, falling back to `default`
    ///
    /// With `eval_lazy == false` a lazy field yields `default` without
    /// running any resolver.
    pub fn get_or(&self, key: &str, default: impl Into<Value>, eval_lazy: bool) -> Value {
        if !eval_lazy && self.is_lazy(key) {
            return default.into();
        }
        self.get(key).unwrap_or_else(|_| default.into())
    }

    /// Read a field, `None` if it does not exist
    pub fn get_opt(&self, key: &str) -> Option<Value> {
        self.get(key).ok()
    }

    /// Membership: the field exists and resolves to a non-null value
    ///
    /// Evaluates lazy fields.
    pub fn contains(&self, key: &str) -> bool {
        self.get_opt(key).is_some_and(|value| !value.is_null())
    }

    /// Concrete stored value, without evaluating lazy fields
    pub fn raw(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key) {
            Some(FieldSlot::Concrete(value)) => Some(value),
            _ => None,
        }
    }

    /// True if the field currently holds a lazy value
    pub fn is_lazy(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(FieldSlot::Lazy(_)))
    }

    /// Remove a field; returns whether it existed
    pub fn remove(&mut self, key: &str) -> bool {
        self.fields.shift_remove(key).is_some()
    }

    /// Field names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of stored fields, lazy ones included
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no fields are stored
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Register `resolver` as the lazy source of each field
    ///
    /// Already-lazy fields get `resolver` appended to their fallback chain.
    /// Fields that are missing or falsy (checked without evaluation) become
    /// lazy. Fields holding real data are left alone.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidField`] when asked to make `url` or `title` lazy.
    pub fn register_lazy_fields<I, S>(&mut self, fields: I, resolver: &LazyResolver) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            let field = field.as_ref();
            if let Some(FieldSlot::Lazy(lazy)) = self.fields.get_mut(field) {
                lazy.push(resolver.clone());
            } else if !self.get_or(field, Value::Null, false).is_truthy() {
                let lazy = LazyField::new(field, resolver.clone());
                self.write(field.to_string(), FieldSlot::Lazy(lazy))?;
            }
        }
        Ok(())
    }

    /// Remove `resolver` from each lazy field
    ///
    /// A lazy field left without resolvers is set to null. Non-lazy fields
    /// are ignored.
    ///
    /// # Returns
    ///
    /// The number of resolvers actually removed.
    pub fn unregister_lazy_fields<I, S>(&mut self, fields: I, resolver: &LazyResolver) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for field in fields {
            let field = field.as_ref();
            let exhausted = match self.fields.get_mut(field) {
                Some(FieldSlot::Lazy(lazy)) => {
                    if lazy.remove(resolver) {
                        removed += 1;
                    }
                    lazy.is_exhausted()
                }
                _ => false,
            };
            if exhausted {
                self.set(field, Value::Null)?;
            }
        }
        Ok(removed)
    }

    /// True if the entry has text `title` and `url`
    pub fn is_valid(&self) -> bool {
        let title = self.get_or("title", Value::Null, true);
        let url = self.get_or("url", Value::Null, true);
        title.is_string() && url.is_string()
    }

    /// `"<title> | <url>"` for logs; never fails
    pub fn safe_str(&self) -> String {
        let show = |key: &str| match self.get_opt(key) {
            Some(value) if !value.is_null() => value.to_string(),
            _ => MISSING.to_string(),
        };
        format!("{} | {}", show("title"), show("url"))
    }

    /// Title for diagnostics, without evaluating anything
    pub(crate) fn title_for_log(&self) -> String {
        self.raw("title")
            .map_or_else(|| MISSING.to_string(), ToString::to_string)
    }

    /// Append a trace line
    pub fn add_trace(
        &mut self,
        plugin: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.trace.push(TraceEntry {
            plugin: plugin.into(),
            operation: operation.into(),
            message: message.into(),
        });
    }

    /// Trace lines in the order they were added
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Render a template against this entry's fields
    pub fn render(&self, template: &str) -> Result<String> {
        self.services
            .diagnostics
            .trace(&format!("rendering: {template}"));
        self.services.renderer.render(template, self)
    }

    /// Render a dynamically-typed template
    ///
    /// # Errors
    ///
    /// [`Error::Type`] if `template` is not text.
    pub fn render_value(&self, template: &Value) -> Result<String> {
        match template {
            Value::Text(template) => self.render(template),
            other => Err(Error::type_error(format!(
                "Trying to render non string template, got {other:?}"
            ))),
        }
    }
}

fn pairs_from(source: Value) -> Result<Vec<(String, Value)>> {
    match source {
        Value::Map(map) => Ok(map.into_iter().collect()),
        Value::List(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::List(pair) if pair.len() == 2 => {
                    let mut pair = pair.into_iter();
                    match (pair.next(), pair.next()) {
                        (Some(Value::Text(key)), Some(value)) => Ok((key, value)),
                        _ => Err(Error::argument(format!(
                            "update sequence element #{index} has a non-text key"
                        ))),
                    }
                }
                other => Err(Error::argument(format!(
                    "update sequence element #{index} is not a key/value pair: {other:?}"
                ))),
            })
            .collect(),
        other => Err(Error::argument(format!(
            "update source must be a map or a list of pairs, got {}",
            other.type_name()
        ))),
    }
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries are equal when their titles and urls are equal
///
/// Evaluates lazy `title`/`url` on both sides.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.get_opt("title") == other.get_opt("title") && self.get_opt("url") == other.get_opt("url")
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.safe_str())
    }
}
