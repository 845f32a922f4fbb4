use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Wire format for bus payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Cbor,
}

/// Encode a value using the given format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Decode bytes using the given format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(Error::from),
        Format::Cbor => Ok(ciborium::from_reader(data)?),
    }
}

/// Guess the format of a payload.
///
/// External writers may send bare JSON scalars (`42`, `"text"`, `-3.5`), so
/// anything that parses as UTF-8 JSON is treated as JSON; the rest is CBOR.
pub fn detect_format(data: &[u8]) -> Format {
    match std::str::from_utf8(data) {
        Ok(text) if serde_json::from_str::<serde_json::Value>(text.trim()).is_ok() => Format::Json,
        _ => Format::Cbor,
    }
}

/// Decode bytes, auto-detecting the format.
pub fn decode_auto<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    decode(data, detect_format(data))
}
