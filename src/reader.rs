//! Read sessions.
//!
//! A reader parses the footer once, keeps the index in memory, and
//! materialises values lazily: each column access performs at most one
//! disk read and one decode, and nothing is cached except decoded
//! properties. Any number of independent readers may be open against the
//! same finalised file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::blob::{BlobFile, BlobRef};
use crate::codec::{lookup_codec, resolve_column_codecs, Codec, ColumnSpec};
use crate::compression::Compression;
use crate::errors::{FddError, Result};
use crate::format::load_footer;
use crate::index::{Index, RecordLocator, SplitStore};
use crate::key::Key;
use crate::path::split_path;
use crate::value::Value;

/// A read session over one finalised file.
///
/// The mapping surface is scoped to the active view: all keys in insertion
/// order by default, or the union of the splits named by a `+`-joined
/// selector.
pub struct Reader {
    path: PathBuf,
    file: Mutex<BlobFile>,
    compression: Compression,
    default_codec_name: String,
    default_codec: Arc<dyn Codec>,
    columns: Option<Vec<ColumnSpec>>,
    column_codecs: Vec<Arc<dyn Codec>>,
    index: Index,
    view: Vec<Key>,
    view_members: HashSet<Key>,
    splits: SplitStore,
    properties: Vec<(String, Vec<u8>)>,
    property_cache: Mutex<HashMap<String, Value>>,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Reader {
    /// Opens a file. The path may carry a `^`-suffixed split selector:
    /// `set.fdd^train+val` is equivalent to
    /// `Reader::open_split("set.fdd", Some("train+val"))`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (path, selector) = split_path(path.as_ref());
        Reader::open_at(path, selector)
    }

    /// Opens a file scoped to a split selector.
    pub fn open_split(path: impl AsRef<Path>, selector: Option<&str>) -> Result<Self> {
        let (path, path_selector) = split_path(path.as_ref());
        Reader::open_at(path, selector.map(str::to_string).or(path_selector))
    }

    fn open_at(path: PathBuf, selector: Option<String>) -> Result<Self> {
        let mut probe = std::fs::File::open(&path)?;
        let file_len = probe.metadata()?.len();
        let (footer, _footer_start) = load_footer(&mut probe, file_len)?;
        drop(probe);

        let default_codec = lookup_codec(&footer.default_codec)?;
        let column_codecs = match &footer.columns {
            Some(columns) => resolve_column_codecs(columns)?,
            None => Vec::new(),
        };
        let index = Index::from_entries(footer.index)
            .map_err(|e| FddError::invalid(format!("footer index: {}", e)))?;
        let splits = SplitStore::from_entries(footer.splits)?;
        let view = splits.compose_view(selector.as_deref(), &index)?;
        let view_members: HashSet<Key> = view.iter().cloned().collect();

        let mut file = BlobFile::open(&path)?;
        file.set_compression(footer.compression);

        tracing::debug!(
            path = %path.display(),
            rows = index.len(),
            view = view.len(),
            selector = selector.as_deref().unwrap_or("<all>"),
            "reader opened"
        );

        Ok(Reader {
            path,
            file: Mutex::new(file),
            compression: footer.compression,
            default_codec_name: footer.default_codec,
            default_codec,
            columns: footer.columns,
            column_codecs,
            index,
            view,
            view_members,
            splits,
            properties: footer.properties,
            property_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Name of the whole-value codec recorded in the footer.
    pub fn default_codec_name(&self) -> &str {
        &self.default_codec_name
    }

    pub fn column_specs(&self) -> Option<&[ColumnSpec]> {
        self.columns.as_deref()
    }

    /// Number of keys in the active view.
    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.view_members.contains(key)
    }

    /// Fetches one row from the active view.
    pub fn get(&self, key: &Key) -> Result<Row<'_>> {
        let locator = self.locator(key)?;
        Ok(Row {
            reader: self,
            locator,
        })
    }

    /// Keys of the active view, in view order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.view.iter()
    }

    /// `(key, row)` pairs in view order. Rows stay lazy; iterating
    /// performs no reads by itself.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, Row<'_>)> {
        self.view.iter().filter_map(move |key| {
            self.index.get(key).map(|locator| {
                (
                    key,
                    Row {
                        reader: self,
                        locator,
                    },
                )
            })
        })
    }

    /// Rows of the active view, in view order.
    pub fn values(&self) -> impl Iterator<Item = Row<'_>> {
        self.iter().map(|(_, row)| row)
    }

    /// Merges another split's keys into the active view, deduplicated,
    /// appended in split order.
    pub fn load_new_split(&mut self, name: &str) -> Result<()> {
        let keys = self
            .splits
            .get(name)
            .ok_or_else(|| FddError::NotFound(format!("split '{}'", name)))?
            .to_vec();
        for key in keys {
            if self.view_members.insert(key.clone()) {
                self.view.push(key);
            }
        }
        Ok(())
    }

    /// Splits declared in the file, in declaration order.
    pub fn split_names(&self) -> impl Iterator<Item = &str> {
        self.splits.names()
    }

    /// Decodes a file-level property, caching the result.
    pub fn property(&self, name: &str) -> Result<Value> {
        let mut cache = lock(&self.property_cache);
        if let Some(value) = cache.get(name) {
            return Ok(value.clone());
        }
        let raw = self
            .properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, raw)| raw)
            .ok_or_else(|| FddError::NotFound(format!("property '{}'", name)))?;
        let value = self.default_codec.decode(raw)?;
        cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(n, _)| n.as_str())
    }

    /// Number of disk reads performed so far, for observing laziness.
    pub fn reads_performed(&self) -> u64 {
        lock(&self.file).reads_performed()
    }

    /// Makes the handle believe it was opened by another process, so the
    /// next read exercises the re-open path. Test instrumentation only.
    #[doc(hidden)]
    pub fn mark_foreign_process(&self) {
        lock(&self.file).mark_foreign_process();
    }

    pub(crate) fn locator(&self, key: &Key) -> Result<&RecordLocator> {
        if !self.view_members.contains(key) {
            return Err(FddError::NotFound(format!("key {}", key)));
        }
        self.index
            .get(key)
            .ok_or_else(|| FddError::NotFound(format!("key {}", key)))
    }

    pub(crate) fn read_blob(&self, blob: BlobRef) -> Result<Vec<u8>> {
        lock(&self.file).read_blob(blob)
    }

    pub(crate) fn read_raw_blob(&self, blob: BlobRef) -> Result<Vec<u8>> {
        lock(&self.file).read_raw(blob)
    }

    pub(crate) fn decode_whole(&self, blob: BlobRef) -> Result<Value> {
        let bytes = self.read_blob(blob)?;
        self.default_codec.decode(&bytes)
    }

    pub(crate) fn decode_column(&self, position: usize, blob: BlobRef) -> Result<Value> {
        let bytes = self.read_blob(blob)?;
        self.column_codecs[position].decode(&bytes)
    }

    pub(crate) fn column_position(&self, name: &str) -> Option<usize> {
        self.columns
            .as_ref()
            .and_then(|columns| columns.iter().position(|c| c.name == name))
    }

    pub(crate) fn column_codec_name(&self, position: usize) -> Option<&str> {
        self.columns
            .as_ref()
            .and_then(|columns| columns.get(position))
            .map(|c| c.codec.as_str())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One record, materialised on demand.
///
/// Column accesses read and decode exactly the requested column; results
/// are not cached. Callers that want caching wrap externally.
pub struct Row<'a> {
    reader: &'a Reader,
    locator: &'a RecordLocator,
}

impl Row<'_> {
    /// The whole value of an unstructured record.
    pub fn value(&self) -> Result<Value> {
        match self.locator {
            RecordLocator::Whole(blob) => self.reader.decode_whole(*blob),
            RecordLocator::Columns(_) => Err(FddError::SchemaMismatch(
                "record is columnar; access columns by name or index".into(),
            )),
        }
    }

    /// One column by position. Absent columns decode to [`Value::Null`].
    pub fn by_index(&self, position: usize) -> Result<Value> {
        match self.locator {
            RecordLocator::Whole(_) => Err(FddError::SchemaMismatch(
                "record is unstructured; use value()".into(),
            )),
            RecordLocator::Columns(slots) => {
                let slot = slots.get(position).ok_or_else(|| {
                    FddError::NotFound(format!("column index {} out of range", position))
                })?;
                match slot {
                    None => Ok(Value::Null),
                    Some(blob) => self.reader.decode_column(position, *blob),
                }
            }
        }
    }

    /// One column by name.
    pub fn by_name(&self, name: &str) -> Result<Value> {
        let position = self
            .reader
            .column_position(name)
            .ok_or_else(|| FddError::NotFound(format!("column '{}'", name)))?;
        self.by_index(position)
    }

    /// Mapping-style access: `None` when the column does not exist or
    /// fails to decode.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.by_name(name).ok()
    }

    /// Number of columns, or `None` for an unstructured record.
    pub fn column_count(&self) -> Option<usize> {
        self.locator.column_count()
    }

    /// Materialises every column (or the whole value) in order.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        match self.locator {
            RecordLocator::Whole(_) => Ok(vec![self.value()?]),
            RecordLocator::Columns(slots) => (0..slots.len())
                .map(|position| self.by_index(position))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{Writer, WriterOptions};
    use tempfile::TempDir;

    fn write_sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("set.fdd");
        let mut writer = Writer::open(
            &path,
            WriterOptions::new().column_names(["text", "label"]),
        )
        .unwrap();
        writer
            .set(
                "doc1",
                crate::row::RowInput::named([
                    ("text", Value::from("A")),
                    ("label", Value::from(1i64)),
                ]),
            )
            .unwrap();
        writer
            .set(
                "doc2",
                crate::row::RowInput::named([("text", Value::from("B"))]),
            )
            .unwrap();
        writer.close().unwrap();
        path
    }

    #[test]
    fn open_rejects_files_without_footers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.fdd");
        std::fs::write(&path, b"no footer here, just bytes").unwrap();
        assert!(matches!(
            Reader::open(&path),
            Err(FddError::InvalidFile(_))
        ));
    }

    #[test]
    fn missing_keys_are_not_found() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let reader = Reader::open(&path).unwrap();
        assert!(matches!(
            reader.get(&Key::from("ghost")),
            Err(FddError::NotFound(_))
        ));
    }

    #[test]
    fn column_access_is_lazy() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let reader = Reader::open(&path).unwrap();

        let baseline = reader.reads_performed();
        let row = reader.get(&Key::from("doc1")).unwrap();
        assert_eq!(reader.reads_performed(), baseline);

        row.by_name("text").unwrap();
        assert_eq!(reader.reads_performed(), baseline + 1);

        // Absent column: no disk read at all.
        let row2 = reader.get(&Key::from("doc2")).unwrap();
        assert!(row2.by_name("label").unwrap().is_null());
        assert_eq!(reader.reads_performed(), baseline + 1);
    }

    #[test]
    fn results_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let reader = Reader::open(&path).unwrap();
        let row = reader.get(&Key::from("doc1")).unwrap();
        row.by_name("text").unwrap();
        row.by_name("text").unwrap();
        assert_eq!(reader.reads_performed(), 2);
    }

    #[test]
    fn properties_decode_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("props.fdd");
        let mut writer = Writer::create(&path).unwrap();
        writer.set("k", "v").unwrap();
        writer.set_property("creator", "alice");
        writer.close().unwrap();

        let reader = Reader::open(&path).unwrap();
        assert_eq!(reader.property("creator").unwrap(), Value::from("alice"));
        assert_eq!(reader.property("creator").unwrap(), Value::from("alice"));
        assert!(matches!(
            reader.property("missing"),
            Err(FddError::NotFound(_))
        ));
    }

    #[test]
    fn fork_marked_handle_still_reads() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let reader = Reader::open(&path).unwrap();
        reader.mark_foreign_process();
        let row = reader.get(&Key::from("doc1")).unwrap();
        assert_eq!(row.by_name("text").unwrap(), Value::from("A"));
    }
}
