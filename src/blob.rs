//! Stream I/O layer.
//!
//! Blobs are contiguous byte ranges in the data region of a file. They are
//! not self-delimiting; every boundary lives in the index. The write side
//! appends blobs and hands back their locations, the read side fetches
//! exact ranges, and both undo compression transparently.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::compression::Compression;
use crate::errors::{FddError, Result};

/// Location of one blob: a byte offset and the stored (post-compression)
/// length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobRef {
    pub offset: u64,
    pub len: u64,
}

impl BlobRef {
    /// Offset one past the last byte of the blob.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Append-only blob writer over an open file.
///
/// Offsets are monotonically increasing; a blob, once appended, is never
/// rewritten. The store also reads its own blobs back, which the writer's
/// mapping surface and pass-through copying rely on.
pub struct BlobStore {
    file: File,
    end: u64,
    compression: Compression,
}

impl BlobStore {
    /// Wraps an open read+write file whose data region ends at `end`.
    pub fn new(file: File, end: u64, compression: Compression) -> Self {
        BlobStore {
            file,
            end,
            compression,
        }
    }

    /// Offset at which the next blob will start.
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Compresses and appends one payload, returning its location.
    pub fn append(&mut self, payload: &[u8]) -> Result<BlobRef> {
        let stored = self.compression.compress(payload)?;
        self.append_raw(&stored)
    }

    /// Appends bytes exactly as given, bypassing compression.
    ///
    /// Used for pass-through copies, where the bytes are already in their
    /// stored form.
    pub fn append_raw(&mut self, stored: &[u8]) -> Result<BlobRef> {
        self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(stored)?;
        let blob = BlobRef {
            offset: self.end,
            len: stored.len() as u64,
        };
        self.end += blob.len;
        Ok(blob)
    }

    /// Reads one blob back and decompresses it.
    pub fn read(&mut self, blob: BlobRef) -> Result<Vec<u8>> {
        let stored = self.read_raw(blob)?;
        self.compression.decompress(&stored, blob.offset)
    }

    /// Reads one blob's stored bytes without decompressing.
    pub fn read_raw(&mut self, blob: BlobRef) -> Result<Vec<u8>> {
        if blob.end() > self.end {
            return Err(FddError::corrupted(
                blob.offset,
                format!(
                    "blob of {} bytes extends past end of data region at {}",
                    blob.len, self.end
                ),
            ));
        }
        self.file.seek(SeekFrom::Start(blob.offset))?;
        let mut stored = vec![0u8; blob.len as usize];
        self.file.read_exact(&mut stored)?;
        Ok(stored)
    }

    /// Writes the footer and trailer, then flushes and syncs.
    ///
    /// Consumes the store: after this the file is finalised and no further
    /// appends are possible.
    pub fn finish(mut self, footer: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(footer)?;
        self.file
            .write_all(&(footer.len() as u64).to_le_bytes())?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Read-only blob access with fork detection.
///
/// The handle records the process id that opened it. Every read compares
/// against the current process id and transparently re-opens the file on
/// mismatch, so a handle duplicated into a forked child never shares a
/// seek position with its parent.
pub struct BlobFile {
    path: PathBuf,
    file: File,
    len: u64,
    owner_pid: u32,
    compression: Compression,
    reads: u64,
}

impl BlobFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(BlobFile {
            path: path.to_path_buf(),
            file,
            len,
            owner_pid: std::process::id(),
            compression: Compression::None,
            reads: 0,
        })
    }

    /// Total file length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Records the file's compression once the footer has been decoded.
    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    /// Number of disk reads performed through this handle.
    pub fn reads_performed(&self) -> u64 {
        self.reads
    }

    /// Reads and decompresses one blob.
    pub fn read_blob(&mut self, blob: BlobRef) -> Result<Vec<u8>> {
        let stored = self.read_raw(blob)?;
        self.compression.decompress(&stored, blob.offset)
    }

    /// Reads one blob's stored bytes without decompressing.
    pub fn read_raw(&mut self, blob: BlobRef) -> Result<Vec<u8>> {
        self.read_range(blob.offset, blob.len)
    }

    /// Reads an exact byte range.
    pub fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>> {
        if offset.checked_add(len).map_or(true, |end| end > self.len) {
            return Err(FddError::corrupted(
                offset,
                format!("read of {} bytes extends past end of file at {}", len, self.len),
            ));
        }
        self.ensure_current_process()?;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        self.file.read_exact(&mut buf).map_err(|e| {
            FddError::corrupted(offset, format!("short read: {}", e))
        })?;
        self.reads += 1;
        Ok(buf)
    }

    /// Pretends the handle was opened by another process, forcing the next
    /// read to re-open the descriptor.
    pub(crate) fn mark_foreign_process(&mut self) {
        self.owner_pid = self.owner_pid.wrapping_add(1);
    }

    fn ensure_current_process(&mut self) -> Result<()> {
        let pid = std::process::id();
        if pid != self.owner_pid {
            tracing::debug!(path = %self.path.display(), pid, "re-opening file handle in new process");
            self.file = File::open(&self.path)?;
            self.owner_pid = pid;
        }
        Ok(())
    }
}
