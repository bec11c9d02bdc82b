//! Contract Test: Snapshot Isolation
//!
//! Constraints verified:
//! - Snapshots are deep copies; later writes never leak into them
//! - Lazy fields and uncopyable objects are skipped with a warning
//! - Empty snapshots are not stored
//! - Overwriting a snapshot warns
//! - Clones of an entry do not share snapshots or fields

mod common;

use common::*;
use feedpipe_core::entry::Entry;
use feedpipe_core::value::{OpaqueValue, Value};
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug)]
struct Socket;

impl OpaqueValue for Socket {
    fn type_name(&self) -> &str {
        "socket"
    }
}

#[derive(Debug)]
struct Quality(&'static str);

impl OpaqueValue for Quality {
    fn type_name(&self) -> &str {
        "quality"
    }

    fn try_clone(&self) -> Option<Arc<dyn OpaqueValue>> {
        Some(Arc::new(Quality(self.0)))
    }
}

#[test]
fn snapshot_is_a_deep_copy() {
    let mut entry = Entry::from_title_url("T", "http://u").unwrap();
    let mut info = IndexMap::new();
    info.insert("tags".to_string(), Value::List(vec![Value::from("hd")]));
    entry.set("info", Value::Map(info)).unwrap();

    entry.take_snapshot("before");

    let mut changed = IndexMap::new();
    changed.insert("tags".to_string(), Value::List(Vec::new()));
    entry.set("info", Value::Map(changed)).unwrap();

    let snapshot = entry.snapshot("before").unwrap();
    let tags = snapshot.get("info").and_then(Value::as_map).and_then(|m| m.get("tags"));
    assert_eq!(tags, Some(&Value::List(vec![Value::from("hd")])));
}

#[test]
fn copyable_objects_are_copied() {
    let mut entry = Entry::from_title_url("T", "http://u").unwrap();
    let quality: Arc<dyn OpaqueValue> = Arc::new(Quality("720p"));
    entry.set("quality", quality.clone()).unwrap();

    entry.take_snapshot("s");

    match entry.snapshot("s").and_then(|s| s.get("quality")) {
        Some(Value::Object(copy)) => {
            assert!(!std::ptr::addr_eq(Arc::as_ptr(copy), Arc::as_ptr(&quality)))
        }
        other => panic!("expected a copied object, got {other:?}"),
    }
}

#[test]
fn uncopyable_and_lazy_fields_are_skipped_with_warnings() {
    let sink = RecordingSink::new();
    let mut entry = recorded_entry(&sink);
    entry.set("title", "T").unwrap();
    entry.set("url", "http://u").unwrap();
    entry.set("connection", Value::Object(Arc::new(Socket))).unwrap();
    let (resolver, _) = counting_resolver("lookup", Some(Value::from("x")));
    entry.register_lazy_fields(["series_name"], &resolver).unwrap();

    entry.take_snapshot("s");

    let snapshot = entry.snapshot("s").unwrap();
    assert!(snapshot.get("connection").is_none());
    assert!(snapshot.get("series_name").is_none());
    assert_eq!(snapshot.len(), 3);
    assert_eq!(sink.warnings(), 2);
}

#[test]
fn empty_snapshot_is_not_stored() {
    let mut entry = Entry::new();
    entry.set("connection", Value::Object(Arc::new(Socket))).unwrap();
    entry.take_snapshot("s");
    assert!(entry.snapshot("s").is_none());
    assert!(entry.snapshots().is_empty());
}

#[test]
fn overwriting_a_snapshot_warns() {
    let sink = RecordingSink::new();
    let mut entry = recorded_entry(&sink);
    entry.set("title", "first").unwrap();
    entry.take_snapshot("s");
    assert_eq!(sink.warnings(), 0);

    entry.set("title", "second").unwrap();
    entry.take_snapshot("s");
    assert_eq!(sink.warnings(), 1);
    assert_eq!(entry.snapshot("s").unwrap().get("title"), Some(&Value::from("second")));
}

#[test]
fn clones_are_independent() {
    let mut original = Entry::from_title_url("T", "http://u").unwrap();
    original.take_snapshot("s");

    let mut copy = original.clone();
    copy.set("quality", "1080p").unwrap();
    copy.take_snapshot("other");

    assert!(!original.contains("quality"));
    assert!(original.snapshot("other").is_none());
    assert!(copy.snapshot("s").is_some());
}

#[test]
fn snapshots_record_capture_time() {
    let before = chrono::Utc::now();
    let mut entry = Entry::from_title_url("T", "http://u").unwrap();
    entry.take_snapshot("s");
    let taken = entry.snapshot("s").unwrap().taken_at();
    assert!(taken >= before && taken <= chrono::Utc::now());
}
