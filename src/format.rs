//! On-disk footer format.
//!
//! A finalised file is laid out as:
//!
//! ```text
//! [ blob_0 ][ blob_1 ]...[ blob_{n-1} ][ FOOTER ][ footer_len: u64 LE ]
//! ```
//!
//! The footer is a self-describing structure holding everything a reader
//! needs: compression, codec names, column definitions, properties,
//! splits, and the index. All integers are little-endian; strings and
//! byte-strings are u32-length-prefixed. The last four bytes of the
//! footer are a CRC32 over everything before them. The footer is never
//! compressed, since it must be readable before the compression algorithm
//! is known.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use crate::blob::BlobRef;
use crate::codec::ColumnSpec;
use crate::compression::Compression;
use crate::errors::{FddError, Result};
use crate::index::RecordLocator;
use crate::key::Key;

/// Magic bytes identifying a freeze-dried data file, format version 1.
pub const MAGIC: [u8; 4] = *b"FDD1";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the fixed trailer: one u64 holding the footer length.
pub const TRAILER_LEN: u64 = 8;

/// Smallest encodable footer: magic, version, compression, empty codec
/// name, unstructured flag, empty property/split/index counts, CRC.
pub const MIN_FOOTER_LEN: u64 = 4 + 1 + 1 + 4 + 1 + 4 + 4 + 8 + 4;

// Key tags.
const KEY_STR: u8 = 0;
const KEY_INT: u8 = 1;
const KEY_BYTES: u8 = 2;

// Locator kinds.
const LOCATOR_WHOLE: u8 = 0;
const LOCATOR_COLUMNS: u8 = 1;

/// Decoded footer contents.
#[derive(Debug)]
pub struct Footer {
    pub compression: Compression,
    pub default_codec: String,
    pub columns: Option<Vec<ColumnSpec>>,
    /// Property values, already encoded with the default codec.
    pub properties: Vec<(String, Vec<u8>)>,
    pub splits: Vec<(String, Vec<Key>)>,
    pub index: Vec<(Key, RecordLocator)>,
}

impl Footer {
    /// Serialises the footer, appending the CRC32.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(FORMAT_VERSION);
        buf.push(self.compression.tag());
        write_str(&mut buf, &self.default_codec)?;

        match &self.columns {
            None => buf.push(0),
            Some(columns) => {
                buf.push(1);
                write_count_u32(&mut buf, columns.len())?;
                for column in columns {
                    write_str(&mut buf, &column.name)?;
                    write_str(&mut buf, &column.codec)?;
                }
            }
        }

        write_count_u32(&mut buf, self.properties.len())?;
        for (name, raw) in &self.properties {
            write_str(&mut buf, name)?;
            write_bytes(&mut buf, raw)?;
        }

        write_count_u32(&mut buf, self.splits.len())?;
        for (name, keys) in &self.splits {
            write_str(&mut buf, name)?;
            write_count_u32(&mut buf, keys.len())?;
            for key in keys {
                write_key(&mut buf, key)?;
            }
        }

        buf.write_u64::<LittleEndian>(self.index.len() as u64)?;
        for (key, locator) in &self.index {
            write_key(&mut buf, key)?;
            write_locator(&mut buf, locator)?;
        }

        let crc = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(crc)?;
        Ok(buf)
    }

    /// Parses a footer, verifying the CRC and consuming every byte.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if (bytes.len() as u64) < MIN_FOOTER_LEN {
            return Err(FddError::invalid(format!(
                "footer of {} bytes is too small",
                bytes.len()
            )));
        }
        let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed_crc = crc32fast::hash(body);
        if stored_crc != computed_crc {
            return Err(FddError::invalid(format!(
                "footer checksum mismatch: computed {:08x}, stored {:08x}",
                computed_crc, stored_crc
            )));
        }

        let mut cursor = std::io::Cursor::new(body);
        let mut magic = [0u8; 4];
        cursor
            .read_exact(&mut magic)
            .map_err(|_| truncated())?;
        if magic != MAGIC {
            return Err(FddError::invalid("magic bytes do not identify an fdd file"));
        }
        let version = cursor.read_u8().map_err(|_| truncated())?;
        if version != FORMAT_VERSION {
            return Err(FddError::invalid(format!(
                "unsupported format version {}",
                version
            )));
        }
        let compression = Compression::from_tag(cursor.read_u8().map_err(|_| truncated())?)?;
        let default_codec = read_str(&mut cursor)?;

        let columns = match cursor.read_u8().map_err(|_| truncated())? {
            0 => None,
            1 => {
                let count = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())?;
                let mut columns = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name = read_str(&mut cursor)?;
                    let codec = read_str(&mut cursor)?;
                    columns.push(ColumnSpec::new(name, codec));
                }
                Some(columns)
            }
            other => {
                return Err(FddError::invalid(format!(
                    "unknown column-definition marker {}",
                    other
                )))
            }
        };

        let prop_count = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())?;
        let mut properties = Vec::with_capacity(prop_count as usize);
        for _ in 0..prop_count {
            let name = read_str(&mut cursor)?;
            let raw = read_bytes(&mut cursor)?;
            properties.push((name, raw));
        }

        let split_count = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())?;
        let mut splits = Vec::with_capacity(split_count as usize);
        for _ in 0..split_count {
            let name = read_str(&mut cursor)?;
            let key_count = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())?;
            let mut keys = Vec::with_capacity(key_count as usize);
            for _ in 0..key_count {
                keys.push(read_key(&mut cursor)?);
            }
            splits.push((name, keys));
        }

        let entry_count = cursor.read_u64::<LittleEndian>().map_err(|_| truncated())?;
        let mut index = Vec::with_capacity(entry_count.min(1 << 20) as usize);
        for _ in 0..entry_count {
            let key = read_key(&mut cursor)?;
            let locator = read_locator(&mut cursor)?;
            index.push((key, locator));
        }

        if cursor.position() != body.len() as u64 {
            return Err(FddError::invalid("trailing bytes after footer contents"));
        }

        Ok(Footer {
            compression,
            default_codec,
            columns,
            properties,
            splits,
            index,
        })
    }

    /// Internal-consistency checks that make a decoded footer a valid
    /// file: every locator lies strictly before the footer, locator arity
    /// matches the column definition, and every split key is indexed.
    pub fn validate(&self, footer_start: u64) -> Result<()> {
        let declared = self.columns.as_ref().map(|c| c.len());
        let mut keys: HashSet<&Key> = HashSet::with_capacity(self.index.len());
        for (key, locator) in &self.index {
            if locator.column_count() != declared {
                return Err(FddError::invalid(format!(
                    "record {} has {:?} column slots, file declares {:?}",
                    key,
                    locator.column_count(),
                    declared
                )));
            }
            for blob in locator.blobs() {
                let end = blob
                    .offset
                    .checked_add(blob.len)
                    .ok_or_else(|| FddError::invalid("blob range overflows"))?;
                if end > footer_start {
                    return Err(FddError::invalid(format!(
                        "blob at {} for record {} overlaps the footer at {}",
                        blob.offset, key, footer_start
                    )));
                }
            }
            keys.insert(key);
        }
        for (name, split_keys) in &self.splits {
            for key in split_keys {
                if !keys.contains(key) {
                    return Err(FddError::invalid(format!(
                        "split '{}' names unknown key {}",
                        name, key
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Reads and validates the footer of an open file.
///
/// Returns the decoded footer and the offset at which it starts, which is
/// also the end of the data region.
pub fn load_footer<F: Read + Seek>(file: &mut F, file_len: u64) -> Result<(Footer, u64)> {
    if file_len < TRAILER_LEN + MIN_FOOTER_LEN {
        return Err(FddError::invalid(format!(
            "file of {} bytes is too small to hold a footer",
            file_len
        )));
    }
    file.seek(SeekFrom::Start(file_len - TRAILER_LEN))?;
    let footer_len = file.read_u64::<LittleEndian>()?;
    let in_range = footer_len
        .checked_add(TRAILER_LEN)
        .map_or(false, |total| total <= file_len);
    if footer_len < MIN_FOOTER_LEN || !in_range {
        return Err(FddError::invalid(format!(
            "trailer names a footer of {} bytes in a file of {}",
            footer_len, file_len
        )));
    }
    let footer_start = file_len - TRAILER_LEN - footer_len;
    file.seek(SeekFrom::Start(footer_start))?;
    let mut bytes = vec![0u8; footer_len as usize];
    file.read_exact(&mut bytes)?;
    let footer = Footer::decode(&bytes)?;
    footer.validate(footer_start)?;
    Ok((footer, footer_start))
}

fn truncated() -> FddError {
    FddError::invalid("truncated footer")
}

fn write_count_u32(buf: &mut Vec<u8>, count: usize) -> Result<()> {
    let count = u32::try_from(count)
        .map_err(|_| FddError::invalid("count exceeds u32 range"))?;
    buf.write_u32::<LittleEndian>(count)?;
    Ok(())
}

fn write_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    write_bytes(buf, s.as_bytes())
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    write_count_u32(buf, bytes.len())?;
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_str<R: Read>(r: &mut R) -> Result<String> {
    let bytes = read_bytes(r)?;
    String::from_utf8(bytes).map_err(|_| FddError::invalid("footer string is not UTF-8"))
}

fn read_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = r.read_u32::<LittleEndian>().map_err(|_| truncated())?;
    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes).map_err(|_| truncated())?;
    Ok(bytes)
}

fn write_key(buf: &mut Vec<u8>, key: &Key) -> Result<()> {
    match key {
        Key::Str(s) => {
            buf.push(KEY_STR);
            write_str(buf, s)
        }
        Key::Int(i) => {
            buf.push(KEY_INT);
            buf.write_i64::<LittleEndian>(*i)?;
            Ok(())
        }
        Key::Bytes(b) => {
            buf.push(KEY_BYTES);
            write_bytes(buf, b)
        }
    }
}

fn read_key<R: Read>(r: &mut R) -> Result<Key> {
    match r.read_u8().map_err(|_| truncated())? {
        KEY_STR => Ok(Key::Str(read_str(r)?)),
        KEY_INT => Ok(Key::Int(r.read_i64::<LittleEndian>().map_err(|_| truncated())?)),
        KEY_BYTES => Ok(Key::Bytes(read_bytes(r)?)),
        other => Err(FddError::invalid(format!("unknown key tag {}", other))),
    }
}

fn write_blob_ref(buf: &mut Vec<u8>, blob: BlobRef) -> Result<()> {
    buf.write_u64::<LittleEndian>(blob.offset)?;
    buf.write_u64::<LittleEndian>(blob.len)?;
    Ok(())
}

fn read_blob_ref<R: Read>(r: &mut R) -> Result<BlobRef> {
    let offset = r.read_u64::<LittleEndian>().map_err(|_| truncated())?;
    let len = r.read_u64::<LittleEndian>().map_err(|_| truncated())?;
    Ok(BlobRef { offset, len })
}

fn write_locator(buf: &mut Vec<u8>, locator: &RecordLocator) -> Result<()> {
    match locator {
        RecordLocator::Whole(blob) => {
            buf.push(LOCATOR_WHOLE);
            write_blob_ref(buf, *blob)
        }
        RecordLocator::Columns(slots) => {
            buf.push(LOCATOR_COLUMNS);
            write_count_u32(buf, slots.len())?;
            for slot in slots {
                match slot {
                    Some(blob) => {
                        buf.push(1);
                        write_blob_ref(buf, *blob)?;
                    }
                    None => buf.push(0),
                }
            }
            Ok(())
        }
    }
}

fn read_locator<R: Read>(r: &mut R) -> Result<RecordLocator> {
    match r.read_u8().map_err(|_| truncated())? {
        LOCATOR_WHOLE => Ok(RecordLocator::Whole(read_blob_ref(r)?)),
        LOCATOR_COLUMNS => {
            let count = r.read_u32::<LittleEndian>().map_err(|_| truncated())?;
            let mut slots = Vec::with_capacity(count as usize);
            for _ in 0..count {
                match r.read_u8().map_err(|_| truncated())? {
                    0 => slots.push(None),
                    1 => slots.push(Some(read_blob_ref(r)?)),
                    other => {
                        return Err(FddError::invalid(format!(
                            "unknown column presence marker {}",
                            other
                        )))
                    }
                }
            }
            Ok(RecordLocator::Columns(slots))
        }
        other => Err(FddError::invalid(format!("unknown locator kind {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_footer() -> Footer {
        Footer {
            compression: Compression::Zlib,
            default_codec: "native".into(),
            columns: Some(vec![
                ColumnSpec::plain("text"),
                ColumnSpec::new("label", "i64-le"),
            ]),
            properties: vec![("creator".into(), vec![4, 0, 0, 0, 0])],
            splits: vec![("train".into(), vec![Key::from("doc1")])],
            index: vec![(
                Key::from("doc1"),
                RecordLocator::Columns(vec![
                    Some(BlobRef { offset: 0, len: 10 }),
                    None,
                ]),
            )],
        }
    }

    #[test]
    fn footer_round_trip() {
        let footer = sample_footer();
        let encoded = footer.encode().unwrap();
        let decoded = Footer::decode(&encoded).unwrap();
        assert_eq!(decoded.compression, Compression::Zlib);
        assert_eq!(decoded.default_codec, "native");
        assert_eq!(decoded.columns, footer.columns);
        assert_eq!(decoded.properties, footer.properties);
        assert_eq!(decoded.splits, footer.splits);
        assert_eq!(decoded.index, footer.index);
    }

    #[test]
    fn corrupted_footer_fails_checksum() {
        let mut encoded = sample_footer().encode().unwrap();
        let mid = encoded.len() / 2;
        encoded[mid] ^= 0xFF;
        let err = Footer::decode(&encoded).unwrap_err();
        assert!(matches!(err, FddError::InvalidFile(_)));
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut encoded = sample_footer().encode().unwrap();
        encoded[0..4].copy_from_slice(b"NOPE");
        // Re-stamp the CRC so only the magic is wrong.
        let body_len = encoded.len() - 4;
        let crc = crc32fast::hash(&encoded[..body_len]);
        encoded[body_len..].copy_from_slice(&crc.to_le_bytes());
        let err = Footer::decode(&encoded).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn truncated_footer_is_rejected() {
        let encoded = sample_footer().encode().unwrap();
        assert!(Footer::decode(&encoded[..encoded.len() - 10]).is_err());
    }

    #[test]
    fn validate_rejects_blob_overlapping_footer() {
        let footer = sample_footer();
        assert!(footer.validate(1024).is_ok());
        assert!(footer.validate(5).is_err());
    }

    #[test]
    fn validate_rejects_unknown_split_key() {
        let mut footer = sample_footer();
        footer.splits.push(("bad".into(), vec![Key::from("ghost")]));
        assert!(footer.validate(1024).is_err());
    }

    #[test]
    fn validate_rejects_arity_mismatch() {
        let mut footer = sample_footer();
        footer.index.push((
            Key::from("doc2"),
            RecordLocator::Columns(vec![Some(BlobRef { offset: 20, len: 5 })]),
        ));
        assert!(footer.validate(1024).is_err());
    }

    #[test]
    fn load_footer_reads_from_end_of_file() {
        let footer = sample_footer();
        let encoded = footer.encode().unwrap();
        let mut file = Vec::new();
        file.extend_from_slice(&[0u8; 64]); // data region
        file.extend_from_slice(&encoded);
        file.extend_from_slice(&(encoded.len() as u64).to_le_bytes());

        let len = file.len() as u64;
        let mut cursor = std::io::Cursor::new(file);
        let (decoded, footer_start) = load_footer(&mut cursor, len).unwrap();
        assert_eq!(footer_start, 64);
        assert_eq!(decoded.index.len(), 1);
    }

    #[test]
    fn load_footer_rejects_small_files() {
        let mut cursor = std::io::Cursor::new(vec![0u8; 10]);
        assert!(matches!(
            load_footer(&mut cursor, 10),
            Err(FddError::InvalidFile(_))
        ));
    }

    #[test]
    fn load_footer_rejects_absurd_trailer() {
        let mut file = vec![0u8; 64];
        file.extend_from_slice(&u64::MAX.to_le_bytes());
        let len = file.len() as u64;
        let mut cursor = std::io::Cursor::new(file);
        assert!(load_footer(&mut cursor, len).is_err());
    }
}
