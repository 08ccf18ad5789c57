//! Opaque entity identifiers and their hex codec.
//!
//! # Responsibility
//! - Convert raw storage identity bytes to the textual form exposed to callers.
//! - Reject malformed textual identifiers before any query is issued.
//!
//! # Invariants
//! - Encoded identifiers are lowercase hex, two characters per byte.
//! - A decoded identifier is exactly `ID_WIDTH` bytes long.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Native identity width of the storage backend, in bytes.
pub const ID_WIDTH: usize = 16;

/// Errors produced while decoding a textual identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Input is not valid hex (bad character or odd length).
    NotHex(String),
    /// Input is valid hex but decodes to the wrong number of bytes.
    WrongWidth { value: String, width: usize },
}

impl Display for IdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotHex(value) => write!(f, "invalid id: `{value}` is not a hex string"),
            Self::WrongWidth { value, width } => write!(
                f,
                "invalid id: `{value}` decodes to {width} bytes, expected {ID_WIDTH}"
            ),
        }
    }
}

impl Error for IdError {}

/// Encodes raw identity bytes as a lowercase hex identifier.
pub fn encode(raw: &[u8]) -> String {
    hex::encode(raw)
}

/// Decodes a hex identifier into raw bytes.
///
/// Only hex validity is checked here; width is checked by [`EntityId`].
pub fn decode(value: &str) -> Result<Vec<u8>, IdError> {
    hex::decode(value).map_err(|_| IdError::NotHex(value.to_string()))
}

/// Identifier of a persisted entity (project or template).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId([u8; ID_WIDTH]);

impl EntityId {
    /// Generates a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    pub fn from_bytes(raw: [u8; ID_WIDTH]) -> Self {
        Self(raw)
    }

    /// Builds an id from a byte slice read back from storage.
    pub fn try_from_slice(raw: &[u8]) -> Result<Self, IdError> {
        let bytes: [u8; ID_WIDTH] = raw.try_into().map_err(|_| IdError::WrongWidth {
            value: encode(raw),
            width: raw.len(),
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ID_WIDTH] {
        &self.0
    }

    /// Parses and validates textual input from an untrusted caller.
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let raw = decode(value)?;
        if raw.len() != ID_WIDTH {
            return Err(IdError::WrongWidth {
                value: value.to_string(),
                width: raw.len(),
            });
        }
        Self::try_from_slice(&raw)
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&encode(&self.0))
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EntityId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, EntityId, IdError, ID_WIDTH};

    #[test]
    fn encode_is_lowercase_and_twice_the_width() {
        let encoded = encode(&[0xAB, 0x01, 0xFF]);
        assert_eq!(encoded, "ab01ff");
    }

    #[test]
    fn decode_rejects_non_hex_and_odd_length() {
        assert!(matches!(decode("invalid-id"), Err(IdError::NotHex(_))));
        assert!(matches!(decode("abc"), Err(IdError::NotHex(_))));
    }

    #[test]
    fn parse_rejects_wrong_width() {
        let err = EntityId::parse("000000000000000000000000").unwrap_err();
        assert!(matches!(err, IdError::WrongWidth { width: 12, .. }));
    }

    #[test]
    fn parse_accepts_uppercase_and_displays_lowercase() {
        let text = "00112233445566778899AABBCCDDEEFF";
        let id = EntityId::parse(text).unwrap();
        assert_eq!(id.to_string(), text.to_ascii_lowercase());
        assert_eq!(id.to_string().len(), ID_WIDTH * 2);
    }

    #[test]
    fn generated_ids_survive_text_form() {
        let id = EntityId::generate();
        let parsed: EntityId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
