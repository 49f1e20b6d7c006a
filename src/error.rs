//! Error types for the resolution pipeline.
//!
//! Only [`ResolveError`] ever reaches a caller of
//! [`Resolver::resolve`](crate::pipeline::Resolver::resolve). The other two
//! are local to a single candidate and are absorbed by the dispatcher.

use thiserror::Error;

use crate::classify::HosterIdentity;
use crate::deobfuscate::SchemeId;

/// A deobfuscation scheme was handed malformed input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("hex payload has odd length {0}")]
    OddLength(usize),

    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("invalid base64 at {stage} stage: {reason}")]
    InvalidBase64 { stage: &'static str, reason: String },

    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,

    #[error("character at position {position} is outside the shifted byte range")]
    OutOfRange { position: usize },

    #[error("scheme {0} is not configured")]
    MissingScheme(SchemeId),
}

/// A single candidate's extraction failed.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Timeout, connection reset, TLS failure and friends.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed response from {url}: {reason}")]
    MalformedBody { url: String, reason: String },

    #[error("deobfuscation failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("no extractor registered for {0}")]
    Unsupported(HosterIdentity),
}

impl ExtractError {
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedBody {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True when the underlying request hit its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

/// Failure surfaced to the caller of a whole resolution run.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Every candidate was dropped, failed, or legitimately returned nothing.
    #[error("no playable sources found ({descriptors} descriptors, {candidates} candidates)")]
    NoPlayableSources { descriptors: usize, candidates: usize },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
