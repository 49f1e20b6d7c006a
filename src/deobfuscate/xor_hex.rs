//! Marker-prefixed, XOR-keyed hex.

use serde::{Deserialize, Serialize};

use super::{Codec, SchemeId};
use crate::error::DecodeError;

/// Hex pairs XORed with `key`, active only when prefixed with `marker`.
///
/// Values without the marker are already plain and pass through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XorHex {
    pub marker: String,
    pub key: u8,
}

impl Default for XorHex {
    fn default() -> Self {
        Self {
            marker: "--".to_string(),
            key: 56,
        }
    }
}

impl Codec for XorHex {
    fn scheme(&self) -> SchemeId {
        SchemeId::XorHex
    }

    fn encode(&self, plain: &str) -> String {
        let xored: Vec<u8> = plain.bytes().map(|b| b ^ self.key).collect();
        format!("{}{}", self.marker, hex::encode(xored))
    }

    fn decode(&self, encoded: &str) -> Result<String, DecodeError> {
        let Some(payload) = encoded.strip_prefix(self.marker.as_str()) else {
            return Ok(encoded.to_string());
        };
        if payload.len() % 2 != 0 {
            return Err(DecodeError::OddLength(payload.len()));
        }

        let mut bytes = hex::decode(payload).map_err(|e| DecodeError::InvalidHex(e.to_string()))?;
        for b in &mut bytes {
            *b ^= self.key;
        }
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }
}
