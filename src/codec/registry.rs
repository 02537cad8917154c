//! Process-wide codec registry.
//!
//! The registry is the crate's only global state. It is append-only:
//! codecs can be registered but never replaced or removed, so a codec name
//! resolved once keeps meaning the same thing for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use super::builtin::{F64Codec, I64Codec, JsonCodec, NativeCodec, RawCodec, U64Codec, Utf8Codec};
use super::Codec;
use crate::errors::{FddError, Result};

static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<dyn Codec>>>> = OnceLock::new();

fn table() -> &'static RwLock<HashMap<String, Arc<dyn Codec>>> {
    REGISTRY.get_or_init(|| {
        let builtins: Vec<Arc<dyn Codec>> = vec![
            Arc::new(NativeCodec),
            Arc::new(RawCodec),
            Arc::new(Utf8Codec),
            Arc::new(I64Codec),
            Arc::new(U64Codec),
            Arc::new(F64Codec),
            Arc::new(JsonCodec),
        ];
        let mut map = HashMap::new();
        for codec in builtins {
            map.insert(codec.name().to_string(), codec);
        }
        RwLock::new(map)
    })
}

/// Registers a user codec under its own name.
///
/// Fails with [`FddError::BadState`] if the name is already taken; the
/// registry never replaces an existing codec.
pub fn register_codec(codec: Arc<dyn Codec>) -> Result<()> {
    let mut map = match table().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let name = codec.name().to_string();
    if map.contains_key(&name) {
        return Err(FddError::BadState(format!(
            "codec '{}' is already registered",
            name
        )));
    }
    map.insert(name, codec);
    Ok(())
}

/// Resolves a codec name from a footer or a column declaration.
///
/// An unknown name is [`FddError::InvalidFile`]: the file cannot be decoded
/// by this process until an equivalent codec is registered.
pub fn lookup_codec(name: &str) -> Result<Arc<dyn Codec>> {
    let map = match table().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.get(name).cloned().ok_or_else(|| {
        FddError::invalid(format!("codec '{}' is not registered", name))
    })
}
