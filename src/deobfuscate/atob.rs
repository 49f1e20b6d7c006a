//! Plain base64 (`atob`/`btoa`), optionally behind a marker.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{Codec, SchemeId};
use crate::error::DecodeError;

/// Pages emit both padded and unpadded values.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Atob {
    /// When set, only marked values are decoded; others pass through.
    pub marker: Option<String>,
}

impl Codec for Atob {
    fn scheme(&self) -> SchemeId {
        SchemeId::Atob
    }

    fn encode(&self, plain: &str) -> String {
        let body = LENIENT.encode(plain);
        match &self.marker {
            Some(marker) => format!("{marker}{body}"),
            None => body,
        }
    }

    fn decode(&self, encoded: &str) -> Result<String, DecodeError> {
        let payload = match &self.marker {
            Some(marker) => match encoded.strip_prefix(marker.as_str()) {
                Some(rest) => rest,
                None => return Ok(encoded.to_string()),
            },
            None => encoded,
        };

        let bytes = LENIENT
            .decode(payload.trim())
            .map_err(|e| DecodeError::InvalidBase64 {
                stage: "atob",
                reason: e.to_string(),
            })?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_padded_and_unpadded() {
        let codec = Atob::default();
        assert_eq!(codec.decode("aGk=").unwrap(), "hi");
        assert_eq!(codec.decode("aGk").unwrap(), "hi");
    }

    #[test]
    fn marker_gates_decoding() {
        let codec = Atob {
            marker: Some("b64:".to_string()),
        };
        assert_eq!(codec.decode("b64:aGk=").unwrap(), "hi");
        assert_eq!(codec.decode("aGk=").unwrap(), "aGk=");
        assert_eq!(codec.encode("hi"), "b64:aGk=");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Atob::default().decode("%%%"),
            Err(DecodeError::InvalidBase64 { stage: "atob", .. })
        ));
    }
}
