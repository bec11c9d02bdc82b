//! Populating an entry from a source object through a field map

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use super::Entry;
use crate::error::{Error, Result};
use crate::value::Value;

/// Function form of a [`FieldSpec`]
pub type FieldMapFn = dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync;

/// Where a target field takes its value from
#[derive(Clone)]
pub enum FieldSpec {
    /// Successive lookups, one per segment of a dotted path
    Path(Vec<String>),
    /// A function of the whole source
    Function(Arc<FieldMapFn>),
}

impl FieldSpec {
    /// Parse a dotted path such as `"info.series.name"`
    pub fn path(dotted: &str) -> Self {
        FieldSpec::Path(dotted.split('.').map(str::to_string).collect())
    }

    /// Wrap a function of the source
    pub fn function<F>(func: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        FieldSpec::Function(Arc::new(func))
    }

    /// Evaluate against `source`
    ///
    /// Path segments use key lookup on maps and attribute lookup on
    /// objects, decided per segment.
    pub fn resolve(&self, source: &Value) -> std::result::Result<Value, String> {
        match self {
            FieldSpec::Path(segments) => {
                let mut current: Option<Value> = None;
                for segment in segments {
                    let base = current.as_ref().unwrap_or(source);
                    let next = base
                        .lookup(segment)
                        .ok_or_else(|| format!("no `{segment}` in {}", base.type_name()))?;
                    current = Some(next);
                }
                Ok(current.unwrap_or_else(|| source.clone()))
            }
            FieldSpec::Function(func) => func(source).map_err(|e| format!("{e:#}")),
        }
    }
}

impl From<&str> for FieldSpec {
    fn from(dotted: &str) -> Self {
        FieldSpec::path(dotted)
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSpec::Path(segments) => write!(f, "Path({})", segments.join(".")),
            FieldSpec::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl Entry {
    /// Fill fields from `source` as described by `field_map`
    ///
    /// Fields are written in map order through the enforced write path.
    ///
    /// # Errors
    ///
    /// [`Error::PathResolution`] on the first lookup or function failure.
    /// Fields written before the failure are kept.
    pub fn update_using_map(&mut self, field_map: &IndexMap<String, FieldSpec>, source: &Value) -> Result<()> {
        for (field, spec) in field_map {
            let value = spec
                .resolve(source)
                .map_err(|reason| Error::path_resolution(field, reason))?;
            self.set(field.clone(), value)?;
        }
        Ok(())
    }
}
