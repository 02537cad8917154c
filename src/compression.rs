//! Per-blob compression.
//!
//! Compression applies to every blob in the data region; the algorithm is
//! chosen at file creation and recorded once in the footer. The footer
//! itself is never compressed, since it must be readable before the
//! algorithm is known.

use crate::errors::{FddError, Result};
use std::io::{Read, Write};

/// Compression algorithm applied to every blob in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Zlib,
    Bz2,
    Gzip,
}

impl Compression {
    /// On-disk tag stored in the footer.
    pub(crate) fn tag(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Zlib => 1,
            Compression::Bz2 => 2,
            Compression::Gzip => 3,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Zlib),
            2 => Ok(Compression::Bz2),
            3 => Ok(Compression::Gzip),
            other => Err(FddError::invalid(format!(
                "unknown compression tag {}",
                other
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Zlib => "zlib",
            Compression::Bz2 => "bz2",
            Compression::Gzip => "gzip",
        }
    }

    /// Compresses one blob payload.
    pub(crate) fn compress(self, payload: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(payload.to_vec()),
            Compression::Zlib => {
                let mut enc =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                enc.write_all(payload)?;
                Ok(enc.finish()?)
            }
            Compression::Bz2 => {
                let mut enc =
                    bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
                enc.write_all(payload)?;
                Ok(enc.finish()?)
            }
            Compression::Gzip => {
                let mut enc =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                enc.write_all(payload)?;
                Ok(enc.finish()?)
            }
        }
    }

    /// Decompresses one blob read back from disk.
    ///
    /// `offset` is only used to anchor corruption errors.
    pub(crate) fn decompress(self, stored: &[u8], offset: u64) -> Result<Vec<u8>> {
        let inflate = |result: std::io::Result<()>, out: Vec<u8>| -> Result<Vec<u8>> {
            match result {
                Ok(()) => Ok(out),
                Err(e) => Err(FddError::corrupted(
                    offset,
                    format!("blob failed to decompress: {}", e),
                )),
            }
        };
        match self {
            Compression::None => Ok(stored.to_vec()),
            Compression::Zlib => {
                let mut out = Vec::new();
                let res = flate2::read::ZlibDecoder::new(stored)
                    .read_to_end(&mut out)
                    .map(|_| ());
                inflate(res, out)
            }
            Compression::Bz2 => {
                let mut out = Vec::new();
                let res = bzip2::read::BzDecoder::new(stored)
                    .read_to_end(&mut out)
                    .map(|_| ());
                inflate(res, out)
            }
            Compression::Gzip => {
                let mut out = Vec::new();
                let res = flate2::read::GzDecoder::new(stored)
                    .read_to_end(&mut out)
                    .map(|_| ());
                inflate(res, out)
            }
        }
    }
}
