//! `hosterkit` - Video hoster resolution pipeline
//!
//! # Features
//!
//! - **Classification**: ordered rules turn raw source descriptors into typed hoster candidates
//! - **Deobfuscation**: XOR-hex, VRF (RC4 + base64 chain) and atob codecs, keyed from config
//! - **Extraction**: concurrent per-hoster extractors with per-candidate failure isolation
//! - **Ranking**: deterministic, preference-driven best-first ordering
//!
//! # Example
//!
//! ```rust,no_run
//! use hosterkit::{Resolver, ResolverConfig, SourceDescriptor, SourceKind};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ResolverConfig::default();
//!     let resolver = Resolver::new(&config)?;
//!     let descriptors = vec![SourceDescriptor::new(
//!         "https://streamtape.com/e/abc",
//!         "Streamtape",
//!         SourceKind::External,
//!     )];
//!     let streams = resolver.resolve(&descriptors, &config.preferences).await?;
//!     println!("Best: {}", streams[0].playback_url);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod deobfuscate;
pub mod dispatch;
pub mod error;
pub mod hoster;
pub mod http_client;
pub mod model;
pub mod pipeline;
pub mod rank;

pub use classify::{ClassificationRule, Classifier, HosterIdentity};
pub use config::{load_config, HosterPolicy, ResolverConfig, UserPreference};
pub use deobfuscate::{Codec, Deobfuscator, SchemeConfig, SchemeId};
pub use dispatch::Dispatcher;
pub use error::{DecodeError, ExtractError, ResolveError};
pub use hoster::{ExtractorSet, HosterExtractor};
pub use http_client::HosterClient;
pub use model::{Candidate, SourceDescriptor, SourceKind, SubtitleTrack, VideoStream};
pub use pipeline::Resolver;
pub use rank::rank;

/// Version of hosterkit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
