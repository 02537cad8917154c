//! Built-in codecs.
//!
//! The `native` codec round-trips every [`Value`] through a tagged binary
//! encoding and is the default for whole records, columns, properties, and
//! keys alike. The remaining codecs are narrow, fixed-shape encoders for
//! columns whose type is known up front.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

use super::Codec;
use crate::errors::{FddError, Result};
use crate::value::Value;

// Value variant tags for the native encoding.
const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_BYTES: u8 = 5;
const TAG_JSON: u8 = 6;

fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| FddError::codec("native", "payload exceeds 4 GiB"))?;
    buf.write_u32::<LittleEndian>(len)
        .map_err(FddError::from)?;
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_len_prefixed<R: Read>(r: &mut R, codec: &str) -> Result<Vec<u8>> {
    let len = r
        .read_u32::<LittleEndian>()
        .map_err(|_| FddError::codec(codec, "truncated length prefix"))?;
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)
        .map_err(|_| FddError::codec(codec, "truncated payload"))?;
    Ok(payload)
}

/// Tagged binary encoding covering every value variant.
pub struct NativeCodec;

impl Codec for NativeCodec {
    fn name(&self) -> &str {
        "native"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match value {
            Value::Null => buf.push(TAG_NULL),
            Value::Bool(b) => {
                buf.push(TAG_BOOL);
                buf.push(u8::from(*b));
            }
            Value::Int(i) => {
                buf.push(TAG_INT);
                buf.write_i64::<LittleEndian>(*i).map_err(FddError::from)?;
            }
            Value::Float(f) => {
                buf.push(TAG_FLOAT);
                buf.write_f64::<LittleEndian>(*f).map_err(FddError::from)?;
            }
            Value::Str(s) => {
                buf.push(TAG_STR);
                write_len_prefixed(&mut buf, s.as_bytes())?;
            }
            Value::Bytes(b) => {
                buf.push(TAG_BYTES);
                write_len_prefixed(&mut buf, b)?;
            }
            Value::Json(j) => {
                buf.push(TAG_JSON);
                let text = serde_json::to_vec(j)
                    .map_err(|e| FddError::codec("native", e.to_string()))?;
                write_len_prefixed(&mut buf, &text)?;
            }
        }
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let mut cursor = std::io::Cursor::new(bytes);
        let tag = cursor
            .read_u8()
            .map_err(|_| FddError::codec("native", "empty payload"))?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_BOOL => {
                let b = cursor
                    .read_u8()
                    .map_err(|_| FddError::codec("native", "truncated bool"))?;
                Value::Bool(b != 0)
            }
            TAG_INT => Value::Int(
                cursor
                    .read_i64::<LittleEndian>()
                    .map_err(|_| FddError::codec("native", "truncated int"))?,
            ),
            TAG_FLOAT => Value::Float(
                cursor
                    .read_f64::<LittleEndian>()
                    .map_err(|_| FddError::codec("native", "truncated float"))?,
            ),
            TAG_STR => {
                let payload = read_len_prefixed(&mut cursor, "native")?;
                Value::Str(String::from_utf8(payload).map_err(|e| {
                    FddError::codec("native", format!("invalid UTF-8: {}", e))
                })?)
            }
            TAG_BYTES => Value::Bytes(read_len_prefixed(&mut cursor, "native")?),
            TAG_JSON => {
                let payload = read_len_prefixed(&mut cursor, "native")?;
                Value::Json(
                    serde_json::from_slice(&payload)
                        .map_err(|e| FddError::codec("native", e.to_string()))?,
                )
            }
            other => {
                return Err(FddError::codec(
                    "native",
                    format!("unknown value tag {}", other),
                ))
            }
        };
        if cursor.position() != bytes.len() as u64 {
            return Err(FddError::codec("native", "trailing bytes after value"));
        }
        Ok(value)
    }
}

/// Byte-strings stored verbatim.
pub struct RawCodec;

impl Codec for RawCodec {
    fn name(&self) -> &str {
        "raw"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(FddError::codec(
                "raw",
                format!("expected bytes, got {}", other.kind()),
            )),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(bytes.to_vec()))
    }
}

/// UTF-8 strings stored without framing.
pub struct Utf8Codec;

impl Codec for Utf8Codec {
    fn name(&self) -> &str {
        "utf8"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Str(s) => Ok(s.as_bytes().to_vec()),
            other => Err(FddError::codec(
                "utf8",
                format!("expected str, got {}", other.kind()),
            )),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        String::from_utf8(bytes.to_vec())
            .map(Value::Str)
            .map_err(|e| FddError::codec("utf8", format!("invalid UTF-8: {}", e)))
    }
}

/// Signed 64-bit little-endian integers.
pub struct I64Codec;

impl Codec for I64Codec {
    fn name(&self) -> &str {
        "i64-le"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Int(i) => Ok(i.to_le_bytes().to_vec()),
            other => Err(FddError::codec(
                "i64-le",
                format!("expected int, got {}", other.kind()),
            )),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| FddError::codec("i64-le", format!("expected 8 bytes, got {}", bytes.len())))?;
        Ok(Value::Int(i64::from_le_bytes(arr)))
    }
}

/// Unsigned 64-bit little-endian integers.
///
/// The value model carries integers as `i64`, so encodable values are the
/// non-negative range and decoded values must fit back into it.
pub struct U64Codec;

impl Codec for U64Codec {
    fn name(&self) -> &str {
        "u64-le"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Int(i) if *i >= 0 => Ok((*i as u64).to_le_bytes().to_vec()),
            Value::Int(i) => Err(FddError::codec(
                "u64-le",
                format!("negative value {} cannot be stored unsigned", i),
            )),
            other => Err(FddError::codec(
                "u64-le",
                format!("expected int, got {}", other.kind()),
            )),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| FddError::codec("u64-le", format!("expected 8 bytes, got {}", bytes.len())))?;
        let raw = u64::from_le_bytes(arr);
        i64::try_from(raw).map(Value::Int).map_err(|_| {
            FddError::codec("u64-le", format!("stored value {} overflows i64", raw))
        })
    }
}

/// IEEE-754 doubles, little-endian. Integers are widened on encode.
pub struct F64Codec;

impl Codec for F64Codec {
    fn name(&self) -> &str {
        "f64-le"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Float(f) => Ok(f.to_le_bytes().to_vec()),
            Value::Int(i) => Ok((*i as f64).to_le_bytes().to_vec()),
            other => Err(FddError::codec(
                "f64-le",
                format!("expected float, got {}", other.kind()),
            )),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| FddError::codec("f64-le", format!("expected 8 bytes, got {}", bytes.len())))?;
        Ok(Value::Float(f64::from_le_bytes(arr)))
    }
}

/// JSON text. Any value with a JSON representation encodes; decoding
/// always yields [`Value::Json`].
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let doc = value.to_json()?;
        serde_json::to_vec(&doc).map_err(|e| FddError::codec("json", e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes)
            .map(Value::Json)
            .map_err(|e| FddError::codec("json", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_round_trips_every_variant() {
        let samples = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-40),
            Value::Float(2.5),
            Value::Str("hello".into()),
            Value::Bytes(vec![0, 255, 7]),
            Value::Json(serde_json::json!({"a": [1, 2, 3]})),
        ];
        let codec = NativeCodec;
        for value in samples {
            let encoded = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn native_rejects_trailing_bytes() {
        let codec = NativeCodec;
        let mut encoded = codec.encode(&Value::Int(1)).unwrap();
        encoded.push(0);
        assert!(codec.decode(&encoded).is_err());
    }

    #[test]
    fn native_rejects_unknown_tag() {
        assert!(NativeCodec.decode(&[200]).is_err());
    }

    #[test]
    fn raw_is_verbatim() {
        let codec = RawCodec;
        let encoded = codec.encode(&Value::Bytes(vec![9, 9])).unwrap();
        assert_eq!(encoded, vec![9, 9]);
        assert!(codec.encode(&Value::Int(1)).is_err());
    }

    #[test]
    fn utf8_validates() {
        let codec = Utf8Codec;
        assert_eq!(
            codec.decode(b"caf\xc3\xa9").unwrap(),
            Value::Str("café".into())
        );
        assert!(codec.decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn fixed_width_ints() {
        let codec = I64Codec;
        let encoded = codec.encode(&Value::Int(-7)).unwrap();
        assert_eq!(encoded.len(), 8);
        assert_eq!(codec.decode(&encoded).unwrap(), Value::Int(-7));
        assert!(codec.decode(&encoded[..4]).is_err());
    }

    #[test]
    fn unsigned_rejects_negative() {
        assert!(U64Codec.encode(&Value::Int(-1)).is_err());
        let encoded = U64Codec.encode(&Value::Int(42)).unwrap();
        assert_eq!(U64Codec.decode(&encoded).unwrap(), Value::Int(42));
        assert!(U64Codec.decode(&u64::MAX.to_le_bytes()).is_err());
    }

    #[test]
    fn json_widens_scalars() {
        let encoded = JsonCodec.encode(&Value::Int(3)).unwrap();
        assert_eq!(
            JsonCodec.decode(&encoded).unwrap(),
            Value::Json(serde_json::json!(3))
        );
    }
}
