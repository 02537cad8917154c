//! Value codecs.
//!
//! A codec turns a [`Value`] into bytes and back. Every file records the
//! name of its default codec and the name of each per-column codec in the
//! footer; a reader resolves those names against the process-wide
//! [registry](registry). Two codecs are considered identical when their
//! names are equal, which is what makes verbatim pass-through copies
//! between files possible.

mod builtin;
mod registry;

pub use builtin::{
    F64Codec, I64Codec, JsonCodec, NativeCodec, RawCodec, U64Codec, Utf8Codec,
};
pub use registry::{lookup_codec, register_codec};

use crate::errors::Result;
use crate::value::Value;

/// Name of the built-in whole-value codec used when no override is given.
pub const DEFAULT_CODEC: &str = "native";

/// An encode/decode pair for one column or for whole records.
///
/// Implementations must round-trip: `decode(encode(v))` yields a value
/// equal to `v` for every value the codec accepts. A codec registered
/// under a name already used by another process must be observationally
/// equivalent to it, otherwise files exchanged between the two are
/// undecodable.
pub trait Codec: Send + Sync {
    /// Stable identifier persisted in file footers.
    fn name(&self) -> &str;

    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

impl std::fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Codec").field(&self.name()).finish()
    }
}

/// One column declaration: a unique name plus the codec it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub codec: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, codec: impl Into<String>) -> Self {
        ColumnSpec {
            name: name.into(),
            codec: codec.into(),
        }
    }

    /// A column using the built-in default codec.
    pub fn plain(name: impl Into<String>) -> Self {
        ColumnSpec::new(name, DEFAULT_CODEC)
    }
}

/// Resolves every codec named by a column list, in declaration order.
pub(crate) fn resolve_column_codecs(
    columns: &[ColumnSpec],
) -> Result<Vec<std::sync::Arc<dyn Codec>>> {
    columns.iter().map(|c| lookup_codec(&c.codec)).collect()
}
