//! Write sessions.
//!
//! A writer streams values to disk as they arrive and keeps everything
//! else (index, splits, properties, pending rows) in memory until
//! [`Writer::close`] appends the footer. A file without a footer is not a
//! valid file, which is why failed operations can leave orphaned blobs
//! behind without corrupting anything.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::blob::BlobStore;
use crate::codec::{lookup_codec, resolve_column_codecs, Codec, ColumnSpec, DEFAULT_CODEC};
use crate::compression::Compression;
use crate::errors::{FddError, Result};
use crate::format::{load_footer, Footer};
use crate::index::{Index, RecordLocator, SplitStore};
use crate::key::Key;
use crate::path::split_path;
use crate::reader::Reader;
use crate::row::{PendingRow, RowInput, RowSnapshot};
use crate::value::Value;

/// How a write session acquires its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Create a new file; fails if the path already exists.
    #[default]
    Fresh,
    /// Create or truncate.
    Overwrite,
    /// Load an existing file's footer and continue appending. All prior
    /// rows, splits, and properties are preserved.
    Reopen,
}

/// Column declaration as supplied by the caller.
///
/// A plain name list is shorthand for one column per name, each using the
/// session's default codec.
#[derive(Debug, Clone)]
enum ColumnDecl {
    Specs(Vec<ColumnSpec>),
    Names(Vec<String>),
}

/// Options for opening a write session.
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    mode: WriteMode,
    columns: Option<ColumnDecl>,
    compression: Option<Compression>,
    default_codec: Option<String>,
}

impl WriterOptions {
    pub fn new() -> Self {
        WriterOptions::default()
    }

    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Declares columns with explicit codecs.
    pub fn columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = Some(ColumnDecl::Specs(columns));
        self
    }

    /// Declares columns by name only; each uses the default codec.
    pub fn column_names<N: Into<String>>(mut self, names: impl IntoIterator<Item = N>) -> Self {
        self.columns = Some(ColumnDecl::Names(names.into_iter().map(Into::into).collect()));
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Overrides the whole-value codec by registered name.
    pub fn default_codec(mut self, name: impl Into<String>) -> Self {
        self.default_codec = Some(name.into());
        self
    }
}

/// A write session over one file.
pub struct Writer {
    path: PathBuf,
    store: BlobStore,
    default_codec_name: String,
    default_codec: Arc<dyn Codec>,
    columns: Option<Vec<ColumnSpec>>,
    column_names: Option<Arc<[String]>>,
    column_codecs: Vec<Arc<dyn Codec>>,
    index: Index,
    splits: SplitStore,
    properties: Vec<(String, Value)>,
    pending: HashMap<Key, PendingRow>,
    pending_order: Vec<Key>,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Writer {
    /// Opens a fresh file; fails if the path exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Writer::open(path, WriterOptions::new())
    }

    /// Creates or truncates the file.
    pub fn overwrite(path: impl AsRef<Path>) -> Result<Self> {
        Writer::open(path, WriterOptions::new().mode(WriteMode::Overwrite))
    }

    /// Resumes appending to a finalised file.
    pub fn reopen(path: impl AsRef<Path>) -> Result<Self> {
        Writer::open(path, WriterOptions::new().mode(WriteMode::Reopen))
    }

    pub fn open(path: impl AsRef<Path>, options: WriterOptions) -> Result<Self> {
        // A `^` selector is accepted on the path surface but a write
        // session always operates on the full index.
        let (path, _selector) = split_path(path.as_ref());
        match options.mode {
            WriteMode::Fresh | WriteMode::Overwrite => Writer::start_fresh(path, options),
            WriteMode::Reopen => Writer::start_reopen(path, options),
        }
    }

    fn start_fresh(path: PathBuf, options: WriterOptions) -> Result<Self> {
        let compression = options.compression.unwrap_or_default();
        let default_codec_name = options
            .default_codec
            .unwrap_or_else(|| DEFAULT_CODEC.to_string());
        let default_codec = lookup_codec(&default_codec_name)?;
        let columns = resolve_columns(options.columns, &default_codec_name)?;

        let mut open_options = OpenOptions::new();
        open_options.read(true).write(true);
        match options.mode {
            WriteMode::Fresh => open_options.create_new(true),
            _ => open_options.create(true).truncate(true),
        };
        let file = open_options.open(&path)?;

        tracing::debug!(
            path = %path.display(),
            mode = ?options.mode,
            compression = compression.name(),
            "write session started"
        );

        Writer::assemble(
            path,
            BlobStore::new(file, 0, compression),
            default_codec_name,
            default_codec,
            columns,
            Index::new(),
            SplitStore::new(),
            Vec::new(),
        )
    }

    fn start_reopen(path: PathBuf, options: WriterOptions) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();
        let (footer, footer_start) = load_footer(&mut file, file_len)?;

        if let Some(requested) = options.compression {
            if requested != footer.compression {
                return Err(FddError::SchemaMismatch(format!(
                    "file uses {} compression, reopen requested {}",
                    footer.compression.name(),
                    requested.name()
                )));
            }
        }
        if let Some(requested) = &options.default_codec {
            if *requested != footer.default_codec {
                return Err(FddError::SchemaMismatch(format!(
                    "file uses default codec '{}', reopen requested '{}'",
                    footer.default_codec, requested
                )));
            }
        }
        let requested_columns = resolve_columns(options.columns, &footer.default_codec)?;
        if let Some(requested) = &requested_columns {
            if footer.columns.as_ref() != Some(requested) {
                return Err(FddError::SchemaMismatch(
                    "reopen column definition does not match the file".into(),
                ));
            }
        }

        let default_codec = lookup_codec(&footer.default_codec)?;
        let index = Index::from_entries(footer.index)
            .map_err(|e| FddError::invalid(format!("footer index: {}", e)))?;
        let splits = SplitStore::from_entries(footer.splits)?;
        let mut properties = Vec::with_capacity(footer.properties.len());
        for (name, raw) in footer.properties {
            properties.push((name, default_codec.decode(&raw)?));
        }

        // Revert the file to just-before-footer; the old footer becomes
        // scratch space for the blobs this session appends.
        file.set_len(footer_start)?;

        tracing::debug!(
            path = %path.display(),
            rows = index.len(),
            data_end = footer_start,
            "write session reopened"
        );

        Writer::assemble(
            path,
            BlobStore::new(file, footer_start, footer.compression),
            footer.default_codec,
            default_codec,
            footer.columns,
            index,
            splits,
            properties,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        path: PathBuf,
        store: BlobStore,
        default_codec_name: String,
        default_codec: Arc<dyn Codec>,
        columns: Option<Vec<ColumnSpec>>,
        index: Index,
        splits: SplitStore,
        properties: Vec<(String, Value)>,
    ) -> Result<Self> {
        let column_codecs = match &columns {
            Some(columns) => resolve_column_codecs(columns)?,
            None => Vec::new(),
        };
        let column_names = columns
            .as_ref()
            .map(|c| c.iter().map(|s| s.name.clone()).collect::<Arc<[String]>>());
        Ok(Writer {
            path,
            store,
            default_codec_name,
            default_codec,
            columns,
            column_names,
            column_codecs,
            index,
            splits,
            properties,
            pending: HashMap::new(),
            pending_order: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> Compression {
        self.store.compression()
    }

    pub fn column_specs(&self) -> Option<&[ColumnSpec]> {
        self.columns.as_deref()
    }

    /// Number of committed rows. Pending rows are not counted until they
    /// are finalised.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.index.contains(key)
    }

    /// Committed keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.index.keys()
    }

    /// Commits one whole row.
    ///
    /// For files without columns the row is a single value; for columnar
    /// files it is a positional or named [`RowInput`]. Missing named
    /// fields are stored absent.
    pub fn set(&mut self, key: impl Into<Key>, row: impl Into<RowInput>) -> Result<()> {
        let key = key.into();
        if self.index.contains(&key) || self.pending.contains_key(&key) {
            return Err(FddError::DuplicateKey(key));
        }
        let locator = match self.column_names.clone() {
            None => {
                let value = match row.into() {
                    RowInput::Value(v) => v,
                    _ => {
                        return Err(FddError::SchemaMismatch(
                            "file has no columns; supply a single value".into(),
                        ))
                    }
                };
                let bytes = self.default_codec.encode(&value)?;
                RecordLocator::Whole(self.store.append(&bytes)?)
            }
            Some(names) => {
                let values = row.into().into_column_values(&names)?;
                let mut slots = Vec::with_capacity(values.len());
                for (position, value) in values.iter().enumerate() {
                    if value.is_null() {
                        slots.push(None);
                        continue;
                    }
                    let bytes = self.column_codecs[position].encode(value)?;
                    slots.push(Some(self.store.append(&bytes)?));
                }
                RecordLocator::Columns(slots)
            }
        };
        self.index.insert(key, locator)
    }

    /// Returns a handle for piecewise column assignment.
    ///
    /// The first call for a new key allocates a pending row; further calls
    /// return a handle to the same row. The row is committed by
    /// [`RowHandle::finalize`], when its last column is assigned, or at
    /// [`Writer::close`], whichever happens first.
    pub fn row(&mut self, key: impl Into<Key>) -> Result<RowHandle<'_>> {
        let key = key.into();
        if self.index.contains(&key) {
            return Err(FddError::DuplicateKey(key));
        }
        let column_count = self
            .column_names
            .as_ref()
            .ok_or_else(|| {
                FddError::SchemaMismatch("file has no columns; use set for whole values".into())
            })?
            .len();
        if !self.pending.contains_key(&key) {
            self.pending.insert(key.clone(), PendingRow::new(column_count));
            self.pending_order.push(key.clone());
        }
        Ok(RowHandle { writer: self, key })
    }

    /// Reads a row back through the write session.
    ///
    /// A pending row yields its known columns with nulls for the rest.
    pub fn get(&mut self, key: &Key) -> Result<RowSnapshot> {
        if let Some(pending) = self.pending.get(key) {
            let slots = pending.slots().to_vec();
            let names = self.require_column_names()?.clone();
            let mut values = Vec::with_capacity(slots.len());
            for (position, slot) in slots.iter().enumerate() {
                values.push(match slot {
                    None => Value::Null,
                    Some(blob) => {
                        let bytes = self.store.read(*blob)?;
                        self.column_codecs[position].decode(&bytes)?
                    }
                });
            }
            return Ok(RowSnapshot::columnar(names, values));
        }
        let locator = self
            .index
            .get(key)
            .cloned()
            .ok_or_else(|| FddError::NotFound(format!("key {}", key)))?;
        match locator {
            RecordLocator::Whole(blob) => {
                let bytes = self.store.read(blob)?;
                Ok(RowSnapshot::unstructured(self.default_codec.decode(&bytes)?))
            }
            RecordLocator::Columns(slots) => {
                let names = self.require_column_names()?.clone();
                let mut values = Vec::with_capacity(slots.len());
                for (position, slot) in slots.iter().enumerate() {
                    values.push(match slot {
                        None => Value::Null,
                        Some(blob) => {
                            let bytes = self.store.read(*blob)?;
                            self.column_codecs[position].decode(&bytes)?
                        }
                    });
                }
                Ok(RowSnapshot::columnar(names, values))
            }
        }
    }

    /// Sets or overwrites a file-level property.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(n, _)| n.as_str())
    }

    /// Creates a named split; every key must already be committed.
    pub fn make_split<K: Into<Key>>(
        &mut self,
        name: &str,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<()> {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        self.splits.make(name, keys, &self.index)
    }

    /// Extends an existing split.
    pub fn add_to_split<K: Into<Key>>(
        &mut self,
        name: &str,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<()> {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        self.splits.add(name, keys, &self.index)
    }

    /// Overwrites a split, creating it if absent.
    pub fn replace_split<K: Into<Key>>(
        &mut self,
        name: &str,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<()> {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        self.splits.replace(name, keys, &self.index)
    }

    pub fn split_names(&self) -> impl Iterator<Item = &str> {
        self.splits.names()
    }

    /// Copies one row from an open reader.
    ///
    /// For each declared column, when `overrides` does not supply it and
    /// the source stores it under an identical codec and compression, the
    /// stored bytes are copied verbatim without a decode/encode cycle.
    /// Everything else is decoded with the source codec and re-encoded
    /// with the destination codec.
    pub fn copy_row_from(
        &mut self,
        source: &Reader,
        source_key: &Key,
        dest_key: Option<Key>,
        overrides: Option<&HashMap<String, Value>>,
    ) -> Result<()> {
        let dest_key = dest_key.unwrap_or_else(|| source_key.clone());
        if self.index.contains(&dest_key) || self.pending.contains_key(&dest_key) {
            return Err(FddError::DuplicateKey(dest_key));
        }
        let pass_through_compression = source.compression() == self.store.compression();

        let locator = match self.column_names.clone() {
            None => {
                if overrides.map_or(false, |o| !o.is_empty()) {
                    return Err(FddError::SchemaMismatch(
                        "file has no columns; overrides name columns".into(),
                    ));
                }
                let blob = match source.locator(source_key)? {
                    RecordLocator::Whole(blob) => *blob,
                    RecordLocator::Columns(_) => {
                        return Err(FddError::SchemaMismatch(
                            "source row is columnar, destination file has no columns".into(),
                        ))
                    }
                };
                let copied = if pass_through_compression
                    && source.default_codec_name() == self.default_codec_name
                {
                    self.store.append_raw(&source.read_raw_blob(blob)?)?
                } else {
                    let value = source.decode_whole(blob)?;
                    let bytes = self.default_codec.encode(&value)?;
                    self.store.append(&bytes)?
                };
                RecordLocator::Whole(copied)
            }
            Some(names) => {
                let source_slots = match source.locator(source_key)? {
                    RecordLocator::Columns(slots) => slots.clone(),
                    RecordLocator::Whole(_) => {
                        return Err(FddError::SchemaMismatch(
                            "source row is unstructured, destination file declares columns".into(),
                        ))
                    }
                };
                let dest_specs = self.columns.clone().unwrap_or_default();
                let mut slots = Vec::with_capacity(names.len());
                for (position, name) in names.iter().enumerate() {
                    if let Some(value) = overrides.and_then(|o| o.get(name)) {
                        if value.is_null() {
                            slots.push(None);
                        } else {
                            let bytes = self.column_codecs[position].encode(value)?;
                            slots.push(Some(self.store.append(&bytes)?));
                        }
                        continue;
                    }
                    let source_blob = source
                        .column_position(name)
                        .and_then(|p| source_slots.get(p).copied().flatten().map(|b| (p, b)));
                    match source_blob {
                        None => slots.push(None),
                        Some((source_position, blob)) => {
                            let source_codec_name = source.column_codec_name(source_position);
                            if pass_through_compression
                                && source_codec_name == Some(dest_specs[position].codec.as_str())
                            {
                                slots.push(Some(
                                    self.store.append_raw(&source.read_raw_blob(blob)?)?,
                                ));
                            } else {
                                let value = source.decode_column(source_position, blob)?;
                                let bytes = self.column_codecs[position].encode(&value)?;
                                slots.push(Some(self.store.append(&bytes)?));
                            }
                        }
                    }
                }
                RecordLocator::Columns(slots)
            }
        };
        self.index.insert(dest_key, locator)
    }

    /// Flushes pending rows, writes the footer and trailer, and syncs.
    ///
    /// Consumes the writer; the file is immutable afterwards unless
    /// reopened.
    pub fn close(mut self) -> Result<()> {
        let pending_keys = std::mem::take(&mut self.pending_order);
        for key in &pending_keys {
            self.commit_pending(key)?;
        }

        let mut properties = Vec::with_capacity(self.properties.len());
        for (name, value) in &self.properties {
            properties.push((name.clone(), self.default_codec.encode(value)?));
        }

        let footer = Footer {
            compression: self.store.compression(),
            default_codec: self.default_codec_name.clone(),
            columns: self.columns.clone(),
            properties,
            splits: std::mem::take(&mut self.splits).into_entries(),
            index: std::mem::take(&mut self.index).into_entries(),
        };
        let row_count = footer.index.len();
        let bytes = footer.encode()?;
        tracing::debug!(
            path = %self.path.display(),
            rows = row_count,
            footer_bytes = bytes.len(),
            "finalising file"
        );
        self.store.finish(&bytes)
    }

    fn commit_pending(&mut self, key: &Key) -> Result<()> {
        let row = self.pending.remove(key).ok_or_else(|| {
            FddError::BadState(format!("row {} is not pending", key))
        })?;
        self.pending_order.retain(|k| k != key);
        self.index
            .insert(key.clone(), RecordLocator::Columns(row.into_slots()))
    }

    fn require_column_names(&self) -> Result<&Arc<[String]>> {
        self.column_names.as_ref().ok_or_else(|| {
            FddError::BadState("columnar record in a file without columns".into())
        })
    }

    fn column_position(&self, name: &str) -> Result<usize> {
        let names = self.column_names.as_ref().ok_or_else(|| {
            FddError::SchemaMismatch("file has no columns".into())
        })?;
        names
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| FddError::NotFound(format!("column '{}'", name)))
    }
}

fn resolve_columns(
    decl: Option<ColumnDecl>,
    default_codec: &str,
) -> Result<Option<Vec<ColumnSpec>>> {
    let columns = match decl {
        None => return Ok(None),
        Some(ColumnDecl::Specs(specs)) => specs,
        Some(ColumnDecl::Names(names)) => names
            .into_iter()
            .map(|name| ColumnSpec::new(name, default_codec))
            .collect(),
    };
    let mut seen = std::collections::HashSet::new();
    for column in &columns {
        if !seen.insert(column.name.as_str()) {
            return Err(FddError::SchemaMismatch(format!(
                "column '{}' declared twice",
                column.name
            )));
        }
    }
    Ok(Some(columns))
}

/// Handle for piecewise assignment into one pending row.
pub struct RowHandle<'a> {
    writer: &'a mut Writer,
    key: Key,
}

impl RowHandle<'_> {
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Assigns one column by name. The value's blob is appended
    /// immediately; only the locator slot stays in memory.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        let position = self.writer.column_position(column)?;
        self.set_at(position, value)
    }

    /// Assigns one column by position.
    pub fn set_at(&mut self, position: usize, value: impl Into<Value>) -> Result<()> {
        let column_count = self.writer.require_column_names()?.len();
        if position >= column_count {
            return Err(FddError::NotFound(format!(
                "column index {} out of range",
                position
            )));
        }
        if !self.writer.pending.contains_key(&self.key) {
            return Err(FddError::BadState(format!(
                "row {} was already committed",
                self.key
            )));
        }
        let column = self.writer.require_column_names()?[position].clone();
        let value = value.into();
        let bytes = self.writer.column_codecs[position].encode(&value)?;
        let blob = self.writer.store.append(&bytes)?;
        let row = self.writer.pending.get_mut(&self.key).ok_or_else(|| {
            FddError::BadState(format!("row {} is not pending", self.key))
        })?;
        row.fill(position, blob, &column)?;
        if row.is_complete() {
            self.writer.commit_pending(&self.key)?;
        }
        Ok(())
    }

    /// Commits the row as it stands; unassigned columns become absent.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.writer.pending.contains_key(&self.key) {
            return Err(FddError::BadState(format!(
                "row {} was already committed",
                self.key
            )));
        }
        self.writer.commit_pending(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn text_label_options() -> WriterOptions {
        WriterOptions::new().column_names(["text", "label"])
    }

    #[test]
    fn fresh_mode_refuses_existing_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("set.fdd");
        std::fs::write(&path, b"occupied").unwrap();
        assert!(matches!(Writer::create(&path), Err(FddError::Io(_))));
    }

    #[test]
    fn overwrite_mode_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("set.fdd");
        std::fs::write(&path, b"old contents").unwrap();
        let writer = Writer::overwrite(&path).unwrap();
        assert!(writer.is_empty());
        writer.close().unwrap();
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut writer = Writer::create(dir.path().join("set.fdd")).unwrap();
        writer.set("k1", "v1").unwrap();
        assert!(matches!(
            writer.set("k1", "again"),
            Err(FddError::DuplicateKey(_))
        ));
    }

    #[test]
    fn unstructured_files_reject_columnar_rows() {
        let dir = TempDir::new().unwrap();
        let mut writer = Writer::create(dir.path().join("set.fdd")).unwrap();
        let err = writer
            .set("k1", RowInput::positional([Value::from(1i64)]))
            .unwrap_err();
        assert!(matches!(err, FddError::SchemaMismatch(_)));
    }

    #[test]
    fn row_handles_need_columns() {
        let dir = TempDir::new().unwrap();
        let mut writer = Writer::create(dir.path().join("set.fdd")).unwrap();
        assert!(matches!(
            writer.row("k1"),
            Err(FddError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn last_column_assignment_commits_the_row() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            Writer::open(dir.path().join("set.fdd"), text_label_options()).unwrap();
        {
            let mut row = writer.row("doc1").unwrap();
            row.set("text", "A").unwrap();
            row.set("label", 1i64).unwrap();
        }
        assert!(writer.contains(&Key::from("doc1")));
        writer.close().unwrap();
    }

    #[test]
    fn partial_rows_read_back_with_nulls() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            Writer::open(dir.path().join("set.fdd"), text_label_options()).unwrap();
        writer.row("doc1").unwrap().set("text", "A").unwrap();

        let snapshot = writer.get(&Key::from("doc1")).unwrap();
        assert_eq!(snapshot.by_name("text").unwrap(), &Value::from("A"));
        assert!(snapshot.by_name("label").unwrap().is_null());
        writer.close().unwrap();
    }

    #[test]
    fn assigning_a_committed_row_is_bad_state() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            Writer::open(dir.path().join("set.fdd"), text_label_options()).unwrap();
        let mut row = writer.row("doc1").unwrap();
        row.set("text", "A").unwrap();
        row.set("label", 0i64).unwrap();
        let err = row.set("text", "B").unwrap_err();
        assert!(matches!(err, FddError::BadState(_)));
        writer.close().unwrap();
    }

    #[test]
    fn properties_overwrite_in_place() {
        let dir = TempDir::new().unwrap();
        let mut writer = Writer::create(dir.path().join("set.fdd")).unwrap();
        writer.set_property("creator", "alice");
        writer.set_property("creator", "bob");
        assert_eq!(writer.property("creator"), Some(&Value::from("bob")));
        assert_eq!(writer.property_names().count(), 1);
        writer.close().unwrap();
    }

    #[test]
    fn splits_require_committed_keys() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            Writer::open(dir.path().join("set.fdd"), text_label_options()).unwrap();
        writer.row("doc1").unwrap().set("text", "A").unwrap();
        // doc1 is pending, not committed.
        assert!(matches!(
            writer.make_split("train", [Key::from("doc1")]),
            Err(FddError::NotFound(_))
        ));
        writer.close().unwrap();
    }

    #[test]
    fn duplicate_column_declaration_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Writer::open(
            dir.path().join("set.fdd"),
            WriterOptions::new().column_names(["a", "a"]),
        )
        .unwrap_err();
        assert!(matches!(err, FddError::SchemaMismatch(_)));
    }
}
