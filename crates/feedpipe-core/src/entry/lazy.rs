//! Deferred field values
//!
//! A [`LazyField`] stands in for a value that has not been computed. It
//! holds the field name and an ordered chain of [`LazyResolver`]s. The
//! entry evaluates the chain on every read; nothing is written back.

use std::fmt;
use std::sync::Arc;

use super::Entry;
use crate::value::Value;

type ResolverFn = dyn Fn(&Entry, &str) -> Option<Value> + Send + Sync;

/// A callback that computes a field on demand
///
/// Resolvers are compared by identity: two clones of the same resolver are
/// equal, two resolvers built from identical closures are not. This is what
/// lets [`Entry::unregister_lazy_fields`] remove exactly the resolver a
/// plugin registered.
#[derive(Clone)]
pub struct LazyResolver {
    name: Arc<str>,
    func: Arc<ResolverFn>,
}

impl LazyResolver {
    /// Wrap a resolver function
    ///
    /// `name` only shows up in diagnostics.
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&Entry, &str) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the resolver
    pub fn resolve(&self, entry: &Entry, field: &str) -> Option<Value> {
        (self.func)(entry, field)
    }
}

impl PartialEq for LazyResolver {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.func), Arc::as_ptr(&other.func))
    }
}

impl Eq for LazyResolver {}

impl fmt::Debug for LazyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<LazyResolver({})>", self.name)
    }
}

/// A field whose value is computed by a fallback chain of resolvers
#[derive(Clone)]
pub struct LazyField {
    field: String,
    resolvers: Vec<LazyResolver>,
}

impl LazyField {
    pub(crate) fn new(field: impl Into<String>, resolver: LazyResolver) -> Self {
        Self {
            field: field.into(),
            resolvers: vec![resolver],
        }
    }

    /// Field this lazy value belongs to
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Registered resolvers, in the order they are tried
    pub fn resolvers(&self) -> &[LazyResolver] {
        &self.resolvers
    }

    pub(crate) fn push(&mut self, resolver: LazyResolver) {
        self.resolvers.push(resolver);
    }

    /// Remove a resolver; returns whether it was registered
    pub(crate) fn remove(&mut self, resolver: &LazyResolver) -> bool {
        match self.resolvers.iter().position(|r| r == resolver) {
            Some(index) => {
                self.resolvers.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Try each resolver in order and return the first non-null result
    ///
    /// Returns [`Value::Null`] when every resolver comes up empty.
    pub fn evaluate(&self, entry: &Entry) -> Value {
        self.resolvers
            .iter()
            .filter_map(|resolver| resolver.resolve(entry, &self.field))
            .find(|value| !value.is_null())
            .unwrap_or(Value::Null)
    }
}

impl fmt::Debug for LazyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<LazyField(field={})>", self.field)
    }
}
