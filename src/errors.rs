//! Error types for freeze-dried data files.
//!
//! Every fallible operation in the crate returns [`Result`]. Errors are
//! never retried internally; a failed mutating operation on a writer leaves
//! the in-memory index and split state unchanged, although already-appended
//! blobs may remain in the file as unreferenced garbage. Such a file is
//! still valid because nothing references the orphaned bytes.

use crate::key::Key;
use thiserror::Error;

/// Result type for all fdd operations.
pub type Result<T> = std::result::Result<T, FddError>;

/// Errors surfaced by readers and writers.
#[derive(Debug, Error)]
pub enum FddError {
    /// The file is not a valid fdd container: bad magic, bad trailer,
    /// checksum mismatch, footer decode failure, or an inconsistent index.
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// A key, column, or split was looked up and does not exist in the
    /// active view.
    #[error("not found: {0}")]
    NotFound(String),

    /// An insertion would overwrite an existing key or split name.
    #[error("duplicate key: {0}")]
    DuplicateKey(Key),

    /// Reopen was attempted with a column definition or compression
    /// setting that does not match the file, or a row was supplied in a
    /// shape the column definition cannot accept.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The operation is not legal for the handle's current state.
    #[error("bad state: {0}")]
    BadState(String),

    /// A codec failed to encode or decode a value.
    #[error("codec {codec}: {message}")]
    Codec { codec: String, message: String },

    /// A blob read ran past the end of the file or produced bytes that
    /// cannot be decompressed.
    #[error("corrupted data at offset {offset}: {message}")]
    Corrupted { offset: u64, message: String },

    /// Underlying file-system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FddError {
    /// Shorthand for an [`FddError::InvalidFile`] with a formatted message.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        FddError::InvalidFile(message.into())
    }

    /// Shorthand for a codec failure.
    pub(crate) fn codec(codec: impl Into<String>, message: impl Into<String>) -> Self {
        FddError::Codec {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a corruption error anchored at a byte offset.
    pub(crate) fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        FddError::Corrupted {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = FddError::corrupted(1024, "blob extends past end of file");
        let text = err.to_string();
        assert!(text.contains("1024"));
        assert!(text.contains("blob extends past end of file"));
    }

    #[test]
    fn duplicate_key_names_the_key() {
        let err = FddError::DuplicateKey(Key::from("doc1"));
        assert!(err.to_string().contains("doc1"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: FddError = io.into();
        assert!(matches!(err, FddError::Io(_)));
    }
}
