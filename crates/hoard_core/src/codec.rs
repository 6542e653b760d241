//! Record encodings on durable storage.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How records are encoded in the record store.
///
/// Every record, ordinary or internal, goes through the same encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// One JSON document per record.
    #[default]
    Json,
    /// One CBOR item per record.
    Cbor,
}

impl Encoding {
    /// Encodes a value.
    pub fn encode<T: Serialize>(self, value: &T) -> CoreResult<Vec<u8>> {
        match self {
            Encoding::Json => Ok(serde_json::to_vec(value)?),
            Encoding::Cbor => {
                let mut buf = Vec::new();
                ciborium::into_writer(value, &mut buf)
                    .map_err(|e| CoreError::codec(e.to_string()))?;
                Ok(buf)
            }
        }
    }

    /// Decodes a value.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> CoreResult<T> {
        match self {
            Encoding::Json => Ok(serde_json::from_slice(bytes)?),
            Encoding::Cbor => {
                ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Json => "json",
            Encoding::Cbor => "cbor",
        })
    }
}

impl FromStr for Encoding {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Encoding::Json),
            "cbor" => Ok(Encoding::Cbor),
            other => Err(CoreError::codec(format!("unknown encoding {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn json_is_plain_json() {
        let bytes = Encoding::Json.encode(&json!({ "id": "USER.1" })).unwrap();
        assert_eq!(bytes, br#"{"id":"USER.1"}"#);
    }

    #[test]
    fn cbor_keeps_nested_values() {
        let record = json!({ "id": "USER.1", "tags": ["a", "b"], "age": 41, "score": 1.5, "ok": true, "none": null });
        let bytes = Encoding::Cbor.encode(&record).unwrap();
        let decoded: Value = Encoding::Cbor.decode(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            Encoding::Json.decode::<Value>(b"{not json"),
            Err(CoreError::Json(_))
        ));
        assert!(matches!(
            Encoding::Cbor.decode::<Value>(&[0xff, 0x00]),
            Err(CoreError::Codec { .. })
        ));
    }

    #[test]
    fn parse_names() {
        assert_eq!("json".parse::<Encoding>().unwrap(), Encoding::Json);
        assert_eq!("CBOR".parse::<Encoding>().unwrap(), Encoding::Cbor);
        assert!("yaml".parse::<Encoding>().is_err());
        assert_eq!(Encoding::Cbor.to_string(), "cbor");
    }
}
