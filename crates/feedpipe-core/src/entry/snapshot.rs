//! Point-in-time copies of an entry's fields
//!
//! A snapshot deep-copies every concrete field. Lazy fields are skipped
//! (their resolvers cannot be copied), as is any value holding an object
//! that refuses to copy; both are reported to the entry's diagnostic sink.
//! A snapshot that would be empty is not stored.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::{Entry, FieldSlot};
use crate::error::{Error, Result};
use crate::value::Value;

/// Deep copy of an entry's concrete fields
#[derive(Debug, Clone)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    fields: IndexMap<String, Value>,
}

/// One difference between a snapshot and the live entry
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    /// Field exists now but did not when the snapshot was taken
    Added { field: String, value: Value },
    /// Field existed in the snapshot but is gone now
    Removed { field: String, value: Value },
    /// Field changed value
    Modified {
        field: String,
        before: Value,
        after: Value,
    },
}

impl Snapshot {
    /// When the snapshot was taken
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Captured value of a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Captured fields in entry order
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Number of captured fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if nothing was captured
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Compare against the entry's current concrete values
    ///
    /// Lazy fields in the live entry are neither evaluated nor reported.
    pub fn diff(&self, entry: &Entry) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        for (field, before) in &self.fields {
            if entry.is_lazy(field) {
                continue;
            }
            match entry.raw(field) {
                Some(after) if after != before => changes.push(FieldChange::Modified {
                    field: field.clone(),
                    before: before.clone(),
                    after: after.clone(),
                }),
                Some(_) => {}
                None => changes.push(FieldChange::Removed {
                    field: field.clone(),
                    value: before.clone(),
                }),
            }
        }

        for field in entry.keys() {
            if self.fields.contains_key(field) {
                continue;
            }
            if let Some(value) = entry.raw(field) {
                changes.push(FieldChange::Added {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }

        changes
    }
}

impl Entry {
    /// Capture the current concrete fields under `name`
    ///
    /// Re-using a name replaces the earlier snapshot.
    pub fn take_snapshot(&mut self, name: impl Into<String>) {
        let name = name.into();
        let diagnostics = &self.services.diagnostics;
        let mut fields = IndexMap::new();

        for (field, slot) in &self.fields {
            match slot {
                FieldSlot::Concrete(value) => match value.deep_copy() {
                    Ok(copy) => {
                        fields.insert(field.clone(), copy);
                    }
                    Err(e) => diagnostics.warning(&format!(
                        "Unable to take `{name}` snapshot for field `{field}` in `{}`: {e}",
                        self.title_for_log()
                    )),
                },
                FieldSlot::Lazy(_) => diagnostics.warning(&format!(
                    "Skipping lazy field `{field}` in `{name}` snapshot of `{}`",
                    self.title_for_log()
                )),
            }
        }

        if fields.is_empty() {
            return;
        }
        if self.snapshots.contains_key(&name) {
            diagnostics.warning(&format!(
                "Snapshot `{name}` is being overwritten for `{}`",
                self.title_for_log()
            ));
        }
        self.snapshots.insert(
            name,
            Snapshot {
                taken_at: Utc::now(),
                fields,
            },
        );
    }

    /// Look up a snapshot by name
    pub fn snapshot(&self, name: &str) -> Option<&Snapshot> {
        self.snapshots.get(name)
    }

    /// All snapshots, in the order they were first taken
    pub fn snapshots(&self) -> &IndexMap<String, Snapshot> {
        &self.snapshots
    }

    /// Roll the entry's concrete fields back to a snapshot
    ///
    /// Concrete fields absent from the snapshot are removed; lazy fields are
    /// kept. Every restored value goes through the enforced write path.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if no snapshot has that name.
    pub fn restore_snapshot(&mut self, name: &str) -> Result<()> {
        let snapshot = self
            .snapshots
            .get(name)
            .ok_or_else(|| Error::key_not_found(format!("snapshot {name}")))?;

        let mut restored = Vec::with_capacity(snapshot.len());
        for (field, value) in &snapshot.fields {
            let copy = value
                .deep_copy()
                .map_err(|e| Error::Other(format!("cannot restore field `{field}`: {e}")))?;
            restored.push((field.clone(), copy));
        }

        let stale: Vec<String> = self
            .fields
            .iter()
            .filter(|(field, slot)| {
                matches!(slot, FieldSlot::Concrete(_)) && !snapshot.fields.contains_key(*field)
            })
            .map(|(field, _)| field.clone())
            .collect();
        for field in stale {
            self.fields.shift_remove(&field);
        }

        self.update(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_skips_lazy_fields() {
        let mut entry = Entry::from_title_url("T", "http://u").unwrap();
        let resolver = crate::entry::LazyResolver::new("r", |_, _| Some(Value::from("x")));
        entry.register_lazy_fields(["series"], &resolver).unwrap();

        entry.take_snapshot("s");
        let snapshot = entry.snapshot("s").unwrap();
        assert!(snapshot.get("series").is_none());
        assert_eq!(snapshot.get("title"), Some(&Value::from("T")));
    }

    #[test]
    fn test_empty_snapshot_is_not_stored() {
        let mut entry = Entry::new();
        entry.take_snapshot("s");
        assert!(entry.snapshot("s").is_none());
    }

    #[test]
    fn test_diff_and_restore() {
        let mut entry = Entry::from_title_url("T", "http://u").unwrap();
        entry.take_snapshot("before");

        entry.set("url", "http://mirror").unwrap();
        entry.set("quality", "720p").unwrap();

        let changes = entry.snapshot("before").unwrap().diff(&entry);
        assert_eq!(
            changes,
            vec![
                FieldChange::Modified {
                    field: "url".to_string(),
                    before: Value::from("http://u"),
                    after: Value::from("http://mirror"),
                },
                FieldChange::Added {
                    field: "quality".to_string(),
                    value: Value::from("720p"),
                },
            ]
        );

        entry.restore_snapshot("before").unwrap();
        assert_eq!(entry.get("url").unwrap(), Value::from("http://u"));
        assert!(!entry.contains("quality"));
        assert!(entry.snapshot("before").unwrap().diff(&entry).is_empty());
    }

    #[test]
    fn test_restore_unknown_snapshot() {
        let mut entry = Entry::new();
        assert!(matches!(entry.restore_snapshot("nope"), Err(Error::KeyNotFound(_))));
    }
}
