//! Field values carried by an [`Entry`](crate::Entry)
//!
//! A [`Value`] is a tagged union over the shapes a pipeline stage may store
//! in an entry. Text is kept in exactly one canonical representation
//! ([`Value::Text`], valid UTF-8). [`Value::RawText`] holds string-typed data
//! that has not been decoded yet; the entry write path decodes it or rejects
//! the write.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Host object stored in an entry without the entry knowing its shape
///
/// Implementations expose attributes for dotted-path lookups and may opt
/// into deep copying for snapshots.
pub trait OpaqueValue: fmt::Debug + Send + Sync {
    /// Short type name used in diagnostics
    fn type_name(&self) -> &str;

    /// Look up a named attribute
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Produce an independent copy, or `None` when the object cannot be copied
    fn try_clone(&self) -> Option<Arc<dyn OpaqueValue>> {
        None
    }
}

/// A concrete field value
#[derive(Clone, Default)]
pub enum Value {
    /// Explicitly empty
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Canonical text
    Text(String),
    /// Undecoded text, converted to [`Value::Text`] on write
    RawText(Vec<u8>),
    /// Ordered sequence
    List(Vec<Value>),
    /// Insertion-ordered mapping
    Map(IndexMap<String, Value>),
    /// Opaque host object
    Object(Arc<dyn OpaqueValue>),
}

/// Reason a value could not be deep copied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyError {
    /// Type name of the object that refused to copy
    pub type_name: String,
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object of type `{}` cannot be copied", self.type_name)
    }
}

impl std::error::Error for CopyError {}

impl Value {
    /// True for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for canonical or undecoded text
    pub fn is_string(&self) -> bool {
        matches!(self, Value::Text(_) | Value::RawText(_))
    }

    /// Borrow canonical text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow a mapping
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Truthiness: null, false, zero, and empty text/collections are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::RawText(b) => !b.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Short type name used in diagnostics and errors
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::RawText(_) => "raw text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(obj) => obj.type_name(),
        }
    }

    /// Decode [`Value::RawText`] into canonical text
    ///
    /// Any other value is returned unchanged. On failure the original value
    /// is handed back so the caller can report it.
    pub fn into_canonical(self) -> std::result::Result<Value, Value> {
        match self {
            Value::RawText(bytes) => String::from_utf8(bytes)
                .map(Value::Text)
                .map_err(|e| Value::RawText(e.into_bytes())),
            other => Ok(other),
        }
    }

    /// Copy the value so that nothing is shared with the original
    pub fn deep_copy(&self) -> std::result::Result<Value, CopyError> {
        Ok(match self {
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(Value::deep_copy)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let mut copy = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    copy.insert(key.clone(), value.deep_copy()?);
                }
                Value::Map(copy)
            }
            Value::Object(obj) => Value::Object(obj.try_clone().ok_or_else(|| CopyError {
                type_name: obj.type_name().to_string(),
            })?),
            other => other.clone(),
        })
    }

    /// Look up one path segment: key lookup on maps, attribute lookup on objects
    pub fn lookup(&self, segment: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(segment).cloned(),
            Value::Object(obj) => obj.attribute(segment),
            _ => None,
        }
    }

    /// Convert to JSON for display and export
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::RawText(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Object(obj) => serde_json::Value::String(format!("<{}>", obj.type_name())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::RawText(a), Value::RawText(b)) => a == b,
            (Value::Text(a), Value::RawText(b)) | (Value::RawText(b), Value::Text(a)) => {
                a.as_bytes() == b.as_slice()
            }
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::RawText(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(map) => f.debug_map().entries(map).finish(),
            Value::Object(obj) => fmt::Debug::fmt(obj, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::RawText(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Object(obj) => write!(f, "<{}>", obj.type_name()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::RawText(bytes)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<Arc<dyn OpaqueValue>> for Value {
    fn from(obj: Arc<dyn OpaqueValue>) -> Self {
        Value::Object(obj)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Handle;

    impl OpaqueValue for Handle {
        fn type_name(&self) -> &str {
            "handle"
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Object(Arc::new(Handle)).is_truthy());
    }

    #[test]
    fn test_raw_text_canonicalisation() {
        let ok = Value::RawText(b"caf\xc3\xa9".to_vec()).into_canonical().unwrap();
        assert_eq!(ok.as_str(), Some("café"));

        let bad = Value::RawText(vec![0xff, 0xfe]).into_canonical();
        assert_eq!(bad.unwrap_err(), Value::RawText(vec![0xff, 0xfe]));
    }

    #[test]
    fn test_deep_copy_rejects_uncopyable_objects() {
        let nested = Value::List(vec![Value::from("a"), Value::Object(Arc::new(Handle))]);
        let err = nested.deep_copy().unwrap_err();
        assert_eq!(err.type_name, "handle");
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"a": [1, 2.5, "x"], "b": null});
        let value = Value::from(json);
        let map = value.as_map().unwrap();
        assert_eq!(map["a"], Value::List(vec![Value::Int(1), Value::Float(2.5), Value::from("x")]));
        assert!(map["b"].is_null());
    }
}
