//! Reversible string transforms used to hide hoster URLs.
//!
//! Sites disguise their real links (and sign their follow-up requests)
//! with a handful of recurring schemes. Each scheme is a [`Codec`]
//! parameterised by key material; [`Deobfuscator`] bundles the configured
//! ones and dispatches on [`SchemeId`].
//!
//! - [`XorHex`]: marker-prefixed hex, each byte XORed with a small key
//! - [`Vrf`]: RC4 -> base64 -> reverse -> base64 -> per-position shift,
//!   with distinct keys for the encrypt and decrypt directions
//! - [`Atob`]: plain base64 with an optional marker
//!
//! All codecs are stateless and `Send + Sync`, so one [`Deobfuscator`] is
//! shared by every concurrently running extractor.

mod atob;
mod vrf;
mod xor_hex;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use atob::Atob;
pub use vrf::Vrf;
pub use xor_hex::XorHex;

use crate::error::DecodeError;

/// Identifies a deobfuscation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeId {
    XorHex,
    Vrf,
    Atob,
}

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::XorHex => "xor-hex",
            Self::Vrf => "vrf",
            Self::Atob => "atob",
        })
    }
}

/// A reversible transform between a plain string and its disguised form.
pub trait Codec: Send + Sync {
    fn scheme(&self) -> SchemeId;

    /// Disguise `plain`. Used to sign request parameters.
    fn encode(&self, plain: &str) -> String;

    /// Recover the plain string. Malformed input is an error, never garbage.
    fn decode(&self, encoded: &str) -> Result<String, DecodeError>;
}

/// Key material for every scheme, as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemeConfig {
    pub xor_hex: XorHex,
    pub atob: Atob,
    /// VRF keys are site specific, so there is no default.
    pub vrf: Option<Vrf>,
}

/// The configured set of schemes.
#[derive(Debug, Clone, Default)]
pub struct Deobfuscator {
    xor_hex: XorHex,
    atob: Atob,
    vrf: Option<Vrf>,
}

impl Deobfuscator {
    pub fn new(config: &SchemeConfig) -> Self {
        Self {
            xor_hex: config.xor_hex.clone(),
            atob: config.atob.clone(),
            vrf: config.vrf.clone(),
        }
    }

    pub fn codec(&self, scheme: SchemeId) -> Result<&dyn Codec, DecodeError> {
        match scheme {
            SchemeId::XorHex => Ok(&self.xor_hex),
            SchemeId::Atob => Ok(&self.atob),
            SchemeId::Vrf => self
                .vrf
                .as_ref()
                .map(|v| v as &dyn Codec)
                .ok_or(DecodeError::MissingScheme(SchemeId::Vrf)),
        }
    }

    pub fn decode(&self, input: &str, scheme: SchemeId) -> Result<String, DecodeError> {
        self.codec(scheme)?.decode(input)
    }

    pub fn encode(&self, input: &str, scheme: SchemeId) -> Result<String, DecodeError> {
        Ok(self.codec(scheme)?.encode(input))
    }

    /// `vrf=<signed id>` ready to append to a query string.
    pub fn vrf_query(&self, id: &str) -> Result<String, DecodeError> {
        self.vrf
            .as_ref()
            .map(|v| v.sign_query(id))
            .ok_or(DecodeError::MissingScheme(SchemeId::Vrf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vrf_is_missing_by_default() {
        let deobfuscator = Deobfuscator::default();
        assert_eq!(
            deobfuscator.decode("abc", SchemeId::Vrf),
            Err(DecodeError::MissingScheme(SchemeId::Vrf))
        );
        assert!(deobfuscator.vrf_query("42").is_err());
    }

    #[test]
    fn dispatches_on_scheme() {
        let deobfuscator = Deobfuscator::default();
        let hidden = deobfuscator
            .encode("/apivtwo/clock?id=7", SchemeId::XorHex)
            .unwrap();
        assert!(hidden.starts_with("--"));
        assert_eq!(
            deobfuscator.decode(&hidden, SchemeId::XorHex).unwrap(),
            "/apivtwo/clock?id=7"
        );

        let wrapped = deobfuscator.encode("https://x/y.m3u8", SchemeId::Atob).unwrap();
        assert_eq!(
            deobfuscator.decode(&wrapped, SchemeId::Atob).unwrap(),
            "https://x/y.m3u8"
        );
    }

    #[test]
    fn round_trips_every_scheme() {
        let config = SchemeConfig {
            vrf: Some(Vrf::symmetric("a-shared-key")),
            ..SchemeConfig::default()
        };
        let deobfuscator = Deobfuscator::new(&config);
        let inputs = ["", "plain", "--", "--6869", "a==b", "ünïcødé/?&=", "x".repeat(300).as_str()]
            .map(String::from);

        for scheme in [SchemeId::XorHex, SchemeId::Vrf, SchemeId::Atob] {
            for input in &inputs {
                let encoded = deobfuscator.encode(input, scheme).unwrap();
                assert_eq!(
                    &deobfuscator.decode(&encoded, scheme).unwrap(),
                    input,
                    "{scheme} round trip of {input:?}"
                );
            }
        }
    }

    #[test]
    fn scheme_config_from_toml() {
        let config: SchemeConfig = toml::from_str(
            r##"
[xor_hex]
marker = "#"
key = 7

[vrf]
encrypt_key = "enc"
decrypt_key = "dec"
offsets = [1, -1]
"##,
        )
        .unwrap();
        assert_eq!(config.xor_hex.marker, "#");
        assert_eq!(config.xor_hex.key, 7);
        let vrf = config.vrf.unwrap();
        assert_eq!(vrf.encrypt_key, "enc");
        assert_eq!(vrf.offsets, vec![1, -1]);
    }
}
