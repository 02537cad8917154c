//! In-memory index and split store.
//!
//! The index maps keys to record locators and preserves insertion order;
//! it is the only place blob boundaries exist. Splits are named, ordered
//! key lists over the same universe of keys.

use std::collections::{HashMap, HashSet};

use crate::blob::BlobRef;
use crate::errors::{FddError, Result};
use crate::key::Key;

/// Per-record descriptor naming the blob locations for its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLocator {
    /// A single blob holding the whole value.
    Whole(BlobRef),
    /// One optional blob per declared column, in declaration order.
    /// `None` is the absent sentinel and decodes to a null marker.
    Columns(Vec<Option<BlobRef>>),
}

impl RecordLocator {
    /// Number of column slots, or `None` for an unstructured record.
    pub fn column_count(&self) -> Option<usize> {
        match self {
            RecordLocator::Whole(_) => None,
            RecordLocator::Columns(slots) => Some(slots.len()),
        }
    }

    /// Iterates every blob reference the locator names.
    pub fn blobs(&self) -> impl Iterator<Item = BlobRef> + '_ {
        let (whole, columns) = match self {
            RecordLocator::Whole(blob) => (Some(*blob), None),
            RecordLocator::Columns(slots) => (None, Some(slots.iter().flatten().copied())),
        };
        whole.into_iter().chain(columns.into_iter().flatten())
    }
}

/// Insertion-ordered mapping from key to record locator.
#[derive(Debug, Default)]
pub struct Index {
    entries: Vec<(Key, RecordLocator)>,
    positions: HashMap<Key, usize>,
}

impl Index {
    pub fn new() -> Self {
        Index::default()
    }

    /// Rebuilds an index from footer entries, rejecting duplicate keys.
    pub fn from_entries(entries: Vec<(Key, RecordLocator)>) -> Result<Self> {
        let mut index = Index::new();
        for (key, locator) in entries {
            index.insert(key, locator)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, key: Key, locator: RecordLocator) -> Result<()> {
        if self.positions.contains_key(&key) {
            return Err(FddError::DuplicateKey(key));
        }
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, locator));
        Ok(())
    }

    pub fn get(&self, key: &Key) -> Option<&RecordLocator> {
        self.positions.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &RecordLocator)> {
        self.entries.iter().map(|(k, l)| (k, l))
    }

    pub fn into_entries(self) -> Vec<(Key, RecordLocator)> {
        self.entries
    }
}

/// Named, ordered key lists.
///
/// Split names are ordered by creation; keys within a split are ordered as
/// added. A key may appear in any number of splits but only once per
/// split.
#[derive(Debug, Default)]
pub struct SplitStore {
    splits: Vec<(String, Vec<Key>)>,
    positions: HashMap<String, usize>,
}

impl SplitStore {
    pub fn new() -> Self {
        SplitStore::default()
    }

    pub fn from_entries(entries: Vec<(String, Vec<Key>)>) -> Result<Self> {
        let mut store = SplitStore::new();
        for (name, keys) in entries {
            if store.positions.contains_key(&name) {
                return Err(FddError::invalid(format!("split '{}' declared twice", name)));
            }
            store.positions.insert(name.clone(), store.splits.len());
            store.splits.push((name, keys));
        }
        Ok(store)
    }

    /// Creates a new split over keys that must all be present in `index`.
    pub fn make(&mut self, name: &str, keys: Vec<Key>, index: &Index) -> Result<()> {
        validate_split_name(name)?;
        if self.positions.contains_key(name) {
            return Err(FddError::DuplicateKey(Key::from(name)));
        }
        let keys = validate_split_keys(name, keys, index, &HashSet::new())?;
        self.positions.insert(name.to_string(), self.splits.len());
        self.splits.push((name.to_string(), keys));
        Ok(())
    }

    /// Extends an existing split.
    pub fn add(&mut self, name: &str, keys: Vec<Key>, index: &Index) -> Result<()> {
        let pos = *self
            .positions
            .get(name)
            .ok_or_else(|| FddError::NotFound(format!("split '{}'", name)))?;
        let existing: HashSet<Key> = self.splits[pos].1.iter().cloned().collect();
        let keys = validate_split_keys(name, keys, index, &existing)?;
        self.splits[pos].1.extend(keys);
        Ok(())
    }

    /// Overwrites a split, creating it if absent.
    pub fn replace(&mut self, name: &str, keys: Vec<Key>, index: &Index) -> Result<()> {
        validate_split_name(name)?;
        let keys = validate_split_keys(name, keys, index, &HashSet::new())?;
        match self.positions.get(name) {
            Some(&pos) => self.splits[pos].1 = keys,
            None => {
                self.positions.insert(name.to_string(), self.splits.len());
                self.splits.push((name.to_string(), keys));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[Key]> {
        self.positions.get(name).map(|&i| self.splits[i].1.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.splits.iter().map(|(n, _)| n.as_str())
    }

    pub fn into_entries(self) -> Vec<(String, Vec<Key>)> {
        self.splits
    }

    pub fn entries(&self) -> &[(String, Vec<Key>)] {
        &self.splits
    }

    /// Resolves a view selector into an ordered key list.
    ///
    /// `None` selects every key in insertion order. A `+`-joined selector
    /// takes the union of the named splits: all keys of the first split in
    /// order, then keys of each later split not already seen, in order.
    pub fn compose_view(&self, selector: Option<&str>, index: &Index) -> Result<Vec<Key>> {
        let spec = match selector {
            None => return Ok(index.keys().cloned().collect()),
            Some(spec) => spec,
        };
        let mut seen: HashSet<&Key> = HashSet::new();
        let mut view = Vec::new();
        for name in spec.split('+') {
            let keys = self
                .get(name)
                .ok_or_else(|| FddError::NotFound(format!("split '{}'", name)))?;
            for key in keys {
                if seen.insert(key) {
                    view.push(key.clone());
                }
            }
        }
        Ok(view)
    }
}

fn validate_split_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FddError::BadState("split name is empty".into()));
    }
    if name.contains('+') || name.contains('^') {
        return Err(FddError::BadState(format!(
            "split name '{}' contains a selector separator",
            name
        )));
    }
    Ok(())
}

/// Checks that every key exists in the index and none repeats within the
/// split. Returns the keys unchanged on success.
fn validate_split_keys(
    split: &str,
    keys: Vec<Key>,
    index: &Index,
    existing: &HashSet<Key>,
) -> Result<Vec<Key>> {
    let mut fresh: HashSet<&Key> = HashSet::new();
    for key in &keys {
        if !index.contains(key) {
            return Err(FddError::NotFound(format!(
                "key {} named by split '{}'",
                key, split
            )));
        }
        if existing.contains(key) || !fresh.insert(key) {
            return Err(FddError::DuplicateKey(key.clone()));
        }
    }
    Ok(keys)
}
