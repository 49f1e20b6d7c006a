//! Keyed stream-cipher chain ("VRF").
//!
//! Encoding: RC4 with `encrypt_key`, URL-safe base64, byte reversal,
//! URL-safe base64 again, then a per-position additive shift from a
//! repeating offset table. Decoding undoes each stage in reverse order,
//! using `decrypt_key` for the RC4 stage.
//!
//! The two keys differ on real sites: the key we sign requests with is
//! not the key the server seals its replies with. [`Vrf::mirrored`] gives
//! the server's view of the same key pair.
//!
//! Shifted bytes are carried as `U+0000..=U+00FF` chars so the token is
//! always a valid `String`.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{Codec, SchemeId};
use crate::error::DecodeError;

const DEFAULT_OFFSETS: [i8; 8] = [-3, 3, -4, 2, -2, 5, 4, 5];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vrf {
    pub encrypt_key: String,
    pub decrypt_key: String,
    #[serde(default = "default_offsets")]
    pub offsets: Vec<i8>,
}

fn default_offsets() -> Vec<i8> {
    DEFAULT_OFFSETS.to_vec()
}

impl Vrf {
    pub fn new(encrypt_key: impl Into<String>, decrypt_key: impl Into<String>) -> Self {
        Self {
            encrypt_key: encrypt_key.into(),
            decrypt_key: decrypt_key.into(),
            offsets: default_offsets(),
        }
    }

    /// Same key in both directions.
    pub fn symmetric(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(key.clone(), key)
    }

    #[must_use]
    pub fn with_offsets(mut self, offsets: Vec<i8>) -> Self {
        self.offsets = offsets;
        self
    }

    /// The peer's codec: it seals with our decrypt key and opens with our
    /// encrypt key.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            encrypt_key: self.decrypt_key.clone(),
            decrypt_key: self.encrypt_key.clone(),
            offsets: self.offsets.clone(),
        }
    }

    /// `vrf=<url-encoded token>` for a follow-up request.
    pub fn sign_query(&self, id: &str) -> String {
        format!("vrf={}", urlencoding::encode(&self.encode(id)))
    }

    fn offset(&self, position: usize) -> i8 {
        if self.offsets.is_empty() {
            0
        } else {
            self.offsets[position % self.offsets.len()]
        }
    }
}

impl Codec for Vrf {
    fn scheme(&self) -> SchemeId {
        SchemeId::Vrf
    }

    fn encode(&self, plain: &str) -> String {
        let sealed = rc4(self.encrypt_key.as_bytes(), plain.as_bytes());
        let mut inner = URL_SAFE.encode(sealed).into_bytes();
        inner.reverse();
        let outer = URL_SAFE.encode(inner);

        outer
            .bytes()
            .enumerate()
            .map(|(i, b)| char::from(b.wrapping_add_signed(self.offset(i))))
            .collect()
    }

    fn decode(&self, encoded: &str) -> Result<String, DecodeError> {
        let outer = encoded
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let b = u8::try_from(u32::from(c))
                    .map_err(|_| DecodeError::OutOfRange { position: i })?;
                Ok(b.wrapping_add_signed(self.offset(i).wrapping_neg()))
            })
            .collect::<Result<Vec<u8>, DecodeError>>()?;

        let mut inner = URL_SAFE
            .decode(outer)
            .map_err(|e| DecodeError::InvalidBase64 {
                stage: "outer",
                reason: e.to_string(),
            })?;
        inner.reverse();
        let sealed = URL_SAFE
            .decode(inner)
            .map_err(|e| DecodeError::InvalidBase64 {
                stage: "inner",
                reason: e.to_string(),
            })?;

        let plain = rc4(self.decrypt_key.as_bytes(), &sealed);
        String::from_utf8(plain).map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// RC4 keystream XOR. An empty key leaves the data untouched.
fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }

    let mut s: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, usize::from(j));
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|&byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(s[usize::from(i)]);
            s.swap(usize::from(i), usize::from(j));
            let k = s[usize::from(s[usize::from(i)].wrapping_add(s[usize::from(j)]))];
            byte ^ k
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc4_matches_reference_vector() {
        // Key "Key", plaintext "Plaintext"
        assert_eq!(
            hex::encode(rc4(b"Key", b"Plaintext")),
            "bbf316e8d940af0ad3"
        );
    }

    #[test]
    fn asymmetric_keys_round_trip_through_the_peer() {
        let ours = Vrf::new("ysJhV6U27FVIjjuk", "hlPeNwkncH0fq9so");
        let server = ours.mirrored();

        let token = server.encode("https://vidplay.example/e/abc?sub.info=x");
        assert_eq!(
            ours.decode(&token).unwrap(),
            "https://vidplay.example/e/abc?sub.info=x"
        );

        let signed = ours.encode("12345");
        assert_eq!(server.decode(&signed).unwrap(), "12345");
    }

    #[test]
    fn asymmetric_keys_do_not_collapse_to_one() {
        let ours = Vrf::new("encrypt-side", "decrypt-side");
        let token = ours.encode("12345");
        assert_ne!(ours.decode(&token).ok().as_deref(), Some("12345"));
    }

    #[test]
    fn empty_and_delimiter_heavy_inputs_round_trip() {
        let vrf = Vrf::symmetric("k");
        for input in ["", "=", "==", "a+b/c-d_e", "vrf=%2F%3D"] {
            assert_eq!(vrf.decode(&vrf.encode(input)).unwrap(), input);
        }
    }

    #[test]
    fn shift_table_is_applied() {
        let plain = Vrf::symmetric("k").with_offsets(vec![]);
        let shifted = Vrf::symmetric("k");
        assert_ne!(plain.encode("id"), shifted.encode("id"));
        assert_eq!(shifted.decode(&shifted.encode("id")).unwrap(), "id");
    }

    #[test]
    fn malformed_token_is_an_error() {
        let vrf = Vrf::symmetric("k").with_offsets(vec![]);
        assert!(matches!(
            vrf.decode("not base64!"),
            Err(DecodeError::InvalidBase64 { stage: "outer", .. })
        ));
        assert_eq!(
            vrf.decode("\u{4e00}"),
            Err(DecodeError::OutOfRange { position: 0 })
        );
    }

    #[test]
    fn sign_query_is_url_encoded() {
        let vrf = Vrf::symmetric("k");
        let query = vrf.sign_query("12345");
        let token = query.strip_prefix("vrf=").unwrap();
        let decoded = urlencoding::decode(token).unwrap();
        assert_eq!(vrf.decode(&decoded).unwrap(), "12345");
    }
}
