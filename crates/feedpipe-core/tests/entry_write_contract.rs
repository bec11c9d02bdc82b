//! Contract Test: Enforced Write Path
//!
//! Every way of putting data into an entry must go through the same
//! normalisation and validation.
//!
//! Constraints verified:
//! - Construction, update, set_default, field maps and snapshot rollback
//!   all reject undecodable text and non-text url/title
//! - A rejected write leaves the entry untouched
//! - `original_url` is captured once
//! - `imdb_url` is canonical or null
//! - Validity needs text `title` and `url`; other fields never matter
//!
//! If this test fails, someone has added a mutation that bypasses `set`.

mod common;

use common::*;
use feedpipe_core::entry::{Entry, FieldSpec};
use feedpipe_core::traits::DiagnosticLevel;
use feedpipe_core::value::Value;
use feedpipe_core::Error;
use indexmap::IndexMap;

#[test]
fn every_write_route_normalises_raw_text() {
    let mut entry = Entry::from_fields([("description", Value::RawText(b"caf\xc3\xa9".to_vec()))]).unwrap();
    assert_eq!(entry.raw("description"), Some(&Value::from("café")));

    entry
        .update([("summary", Value::RawText(b"plain".to_vec()))])
        .unwrap();
    assert_eq!(entry.raw("summary"), Some(&Value::from("plain")));

    entry
        .set_default("notes", Value::RawText(b"note".to_vec()))
        .unwrap();
    assert_eq!(entry.raw("notes"), Some(&Value::from("note")));

    let mut map = IndexMap::new();
    map.insert("mapped".to_string(), FieldSpec::path("raw"));
    let mut source = IndexMap::new();
    source.insert("raw".to_string(), Value::RawText(b"from map".to_vec()));
    entry.update_using_map(&map, &Value::Map(source)).unwrap();
    assert_eq!(entry.raw("mapped"), Some(&Value::from("from map")));
}

#[test]
fn every_write_route_rejects_undecodable_text() {
    let bad = || Value::RawText(vec![0xff, 0xfe]);

    assert!(matches!(
        Entry::from_fields([("description", bad())]),
        Err(Error::Encoding { .. })
    ));

    let mut entry = Entry::from_title_url("T", "http://u").unwrap();
    assert!(matches!(entry.update([("d", bad())]), Err(Error::Encoding { .. })));
    assert!(matches!(entry.set_default("d", bad()), Err(Error::Encoding { .. })));
    assert!(!entry.contains("d"));

    let mut kwargs = IndexMap::new();
    kwargs.insert("d".to_string(), bad());
    assert!(matches!(
        entry.update_from_args(Vec::new(), kwargs),
        Err(Error::Encoding { .. })
    ));
    assert_eq!(entry.len(), 3);
}

#[test]
fn url_and_title_stay_text_on_every_route() {
    assert!(matches!(
        Entry::from_title_url(Value::Int(1), "http://u"),
        Err(Error::InvalidField { .. })
    ));

    let mut entry = Entry::from_title_url("T", "http://u").unwrap();
    assert!(matches!(
        entry.update([("url", Value::List(Vec::new()))]),
        Err(Error::InvalidField { .. })
    ));
    assert_eq!(entry.get("url").unwrap(), Value::from("http://u"));

    let mut map = IndexMap::new();
    map.insert("title".to_string(), FieldSpec::function(|_| Ok(Value::Int(7))));
    assert!(matches!(
        entry.update_using_map(&map, &Value::Null),
        Err(Error::InvalidField { .. })
    ));
    assert_eq!(entry.get("title").unwrap(), Value::from("T"));
}

#[test]
fn original_url_survives_updates_and_rollback() {
    let mut entry = Entry::from_title_url("T", "http://first").unwrap();
    entry.take_snapshot("start");

    entry.set("url", "http://second").unwrap();
    entry.set("url", "http://third").unwrap();
    assert_eq!(entry.get("original_url").unwrap(), Value::from("http://first"));

    entry.restore_snapshot("start").unwrap();
    assert_eq!(entry.get("url").unwrap(), Value::from("http://first"));
    assert_eq!(entry.get("original_url").unwrap(), Value::from("http://first"));
}

#[test]
fn explicit_original_url_is_not_replaced() {
    let mut entry = Entry::new();
    entry.set("original_url", "http://origin").unwrap();
    entry.set("url", "http://mirror").unwrap();
    assert_eq!(entry.get("original_url").unwrap(), Value::from("http://origin"));
}

#[test]
fn invalid_imdb_url_is_nulled_with_diagnostic() {
    let sink = RecordingSink::new();
    let mut entry = recorded_entry(&sink);

    entry.set("imdb_url", "https://www.imdb.com/name/nm0000206").unwrap();
    assert_eq!(
        entry.get("imdb_url").unwrap(),
        Value::from("https://www.imdb.com/title/nm0000206/")
    );

    entry.set("imdb_url", "https://example.com/").unwrap();
    assert!(entry.get("imdb_url").unwrap().is_null());
    assert!(
        sink.at(DiagnosticLevel::Debug)
            .iter()
            .any(|m| m.contains("invalid imdb url"))
    );
}

#[test]
fn writes_are_traced() {
    let sink = RecordingSink::new();
    let mut entry = recorded_entry(&sink);
    entry.set("quality", "720p").unwrap();

    let traces = sink.at(DiagnosticLevel::Trace);
    assert!(traces.iter().any(|m| m.starts_with("ENTRY SET: quality")));
}

#[test]
fn removing_a_field_never_adds_data() {
    let mut entry = Entry::from_title_url("T", "http://u").unwrap();
    entry.set("quality", "720p").unwrap();

    assert!(entry.remove("quality"));
    assert!(!entry.remove("quality"));
    assert_eq!(entry.keys().collect::<Vec<_>>(), ["title", "original_url", "url"]);
}

#[test]
fn validity_tracks_title_and_url_only() {
    let (empty, _) = counting_resolver("empty", None);
    let (found, _) = counting_resolver("found", Some(Value::from("Show")));

    let mut entry = Entry::from_title_url("Show S01E01", "http://example/ep1").unwrap();
    assert!(entry.is_valid());

    entry.register_lazy_fields(["series_name"], &empty).unwrap();
    assert!(entry.is_valid());
    entry.register_lazy_fields(["series_name"], &found).unwrap();
    assert!(entry.is_valid());

    assert!(matches!(
        entry.set("title", Value::Int(5)),
        Err(Error::InvalidField { .. })
    ));
    assert!(entry.is_valid());

    assert!(entry.remove("url"));
    assert!(!entry.is_valid());
    assert_eq!(entry.get("original_url").unwrap(), Value::from("http://example/ep1"));

    let mut entry = Entry::from_title_url("Show S01E01", "http://example/ep1").unwrap();
    entry.register_lazy_fields(["series_name"], &found).unwrap();
    assert!(entry.remove("title"));
    assert!(!entry.is_valid());
    assert_eq!(entry.get("series_name").unwrap(), Value::from("Show"));
}
