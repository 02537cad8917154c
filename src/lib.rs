//! Freeze-dried data.
//!
//! A single-file, append-only, immutable-after-close container for
//! machine-learning datasets. A file behaves like a mapping from keys to
//! records; values live on disk and are loaded on demand, while the
//! key-to-offset index lives in memory once the file is open.
//!
//! ```no_run
//! use fdd::{Key, Reader, RowInput, Writer, WriterOptions};
//!
//! # fn main() -> fdd::Result<()> {
//! let mut writer = Writer::open(
//!     "reviews.fdd",
//!     WriterOptions::new().column_names(["text", "label"]),
//! )?;
//! writer.set("doc1", RowInput::named([("text", "A"), ("label", "pos")]))?;
//! writer.make_split("train", [Key::from("doc1")])?;
//! writer.close()?;
//!
//! let reader = Reader::open("reviews.fdd^train")?;
//! let row = reader.get(&Key::from("doc1"))?;
//! assert_eq!(row.by_name("text")?.as_str(), Some("A"));
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod codec;
pub mod compression;
pub mod errors;
pub mod format;
pub mod index;
pub mod key;
mod path;
pub mod reader;
pub mod row;
pub mod value;
pub mod writer;

pub use blob::BlobRef;
pub use codec::{register_codec, Codec, ColumnSpec, DEFAULT_CODEC};
pub use compression::Compression;
pub use errors::{FddError, Result};
pub use index::RecordLocator;
pub use key::Key;
pub use reader::{Reader, Row};
pub use row::{RowInput, RowSnapshot};
pub use value::Value;
pub use writer::{RowHandle, WriteMode, Writer, WriterOptions};
