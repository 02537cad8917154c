//! Path surface.
//!
//! A path handed to a reader (or to a writer reopening a file) may carry a
//! split selector after a `^`: `dataset.fdd^train+val` opens
//! `dataset.fdd` scoped to the union of the `train` and `val` splits.

use std::path::{Path, PathBuf};

/// Splits `dataset.fdd^train+val` into the file path and the selector.
///
/// Paths that are not valid UTF-8 cannot carry a selector and pass through
/// unchanged.
pub(crate) fn split_path(path: &Path) -> (PathBuf, Option<String>) {
    if let Some(text) = path.to_str() {
        if let Some((file, selector)) = text.rsplit_once('^') {
            return (PathBuf::from(file), Some(selector.to_string()));
        }
    }
    (path.to_path_buf(), None)
}
