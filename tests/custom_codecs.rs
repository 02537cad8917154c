//! User-registered codec tests.
//!
//! Footers store codec names, not code. A file written with a custom
//! codec can be read by any process that registers an equivalent codec
//! under the same name before opening.

use std::sync::Arc;

use fdd::{register_codec, Codec, ColumnSpec, FddError, Key, Reader, RowInput, Value, Writer,
          WriterOptions};
use tempfile::TempDir;

/// Stores strings XOR-rotated by a fixed byte, as a stand-in for a real
/// domain-specific encoder.
struct RotCodec;

impl Codec for RotCodec {
    fn name(&self) -> &str {
        "rot-x17"
    }

    fn encode(&self, value: &Value) -> std::result::Result<Vec<u8>, FddError> {
        match value {
            Value::Str(s) => Ok(s.bytes().map(|b| b ^ 0x17).collect()),
            other => Err(FddError::BadState(format!(
                "rot-x17 encodes strings, got {}",
                other.kind()
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<Value, FddError> {
        let restored: Vec<u8> = bytes.iter().map(|b| b ^ 0x17).collect();
        String::from_utf8(restored)
            .map(Value::Str)
            .map_err(|e| FddError::BadState(e.to_string()))
    }
}

fn ensure_registered() {
    // Another test in this binary may have registered it first.
    let _ = register_codec(Arc::new(RotCodec));
}

#[test]
fn custom_column_codec_round_trips() {
    ensure_registered();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rot.fdd");

    {
        let mut writer = Writer::open(
            &path,
            WriterOptions::new().columns(vec![
                ColumnSpec::new("secret", "rot-x17"),
                ColumnSpec::plain("label"),
            ]),
        )
        .unwrap();
        writer
            .set(
                "doc1",
                RowInput::named([
                    ("secret", Value::from("attack at dawn")),
                    ("label", Value::from(1i64)),
                ]),
            )
            .unwrap();
        writer.close().unwrap();
    }

    let reader = Reader::open(&path).unwrap();
    let specs = reader.column_specs().unwrap();
    assert_eq!(specs[0].codec, "rot-x17");

    let row = reader.get(&Key::from("doc1")).unwrap();
    assert_eq!(row.by_name("secret").unwrap(), Value::from("attack at dawn"));
}

#[test]
fn custom_default_codec_applies_to_properties() {
    ensure_registered();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rot_default.fdd");

    {
        let mut writer = Writer::open(
            &path,
            WriterOptions::new().default_codec("rot-x17"),
        )
        .unwrap();
        writer.set("k1", "whole values too").unwrap();
        writer.set_property("creator", "cipher");
        writer.close().unwrap();
    }

    let reader = Reader::open(&path).unwrap();
    assert_eq!(reader.default_codec_name(), "rot-x17");
    assert_eq!(
        reader.get(&Key::from("k1")).unwrap().value().unwrap(),
        Value::from("whole values too")
    );
    assert_eq!(reader.property("creator").unwrap(), Value::from("cipher"));
}
