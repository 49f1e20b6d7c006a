//! Hoster extractors.
//!
//! Each [`HosterExtractor`] turns one classified [`Candidate`] into zero or
//! more playable [`VideoStream`]s, doing whatever network round-trips its
//! hoster needs.
//!
//! # Architecture
//!
//! - [`HosterExtractor`]: async trait, one implementation per identity
//! - [`ExtractorSet`]: looks up the extractor for an identity
//! - [`playlist`]: HLS master expansion shared by several extractors
//!
//! Extractors hold no per-candidate state. The same instance runs many
//! candidates at once from different tasks.
//!
//! # Contract
//!
//! - `Ok(vec![])` when the hoster legitimately has nothing to play
//! - `Err` only for transport failures, bad status, malformed bodies and
//!   decode failures; the dispatcher turns those into zero streams

pub mod dood;
pub mod internal;
pub mod player;
pub mod playlist;
pub mod streamtape;
pub mod voe;

use std::sync::Arc;

use async_trait::async_trait;

use crate::classify::{Classifier, HosterIdentity};
use crate::config::ResolverConfig;
use crate::deobfuscate::Deobfuscator;
use crate::error::ExtractError;
use crate::http_client::HosterClient;
use crate::model::{Candidate, VideoStream};

pub use dood::DoodExtractor;
pub use internal::InternalExtractor;
pub use player::PlayerExtractor;
pub use streamtape::StreamtapeExtractor;
pub use voe::VoeExtractor;

/// Extractor for one hoster identity (or family of identities).
#[async_trait]
pub trait HosterExtractor: Send + Sync {
    /// Short lowercase extractor name (e.g., `"voe"`, `"internal"`).
    fn name(&self) -> &'static str;

    /// Returns `true` if this extractor handles the given identity.
    fn handles(&self, identity: &HosterIdentity) -> bool;

    /// Resolve one candidate into playable streams.
    async fn extract(
        &self,
        candidate: &Candidate,
        client: &HosterClient,
    ) -> Result<Vec<VideoStream>, ExtractError>;
}

/// Registered extractors. First one that handles an identity wins.
#[derive(Clone, Default)]
pub struct ExtractorSet {
    extractors: Vec<Arc<dyn HosterExtractor>>,
}

impl ExtractorSet {
    /// Empty set; add extractors with [`ExtractorSet::with`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The third-party hosters that can appear as embeds.
    pub fn external() -> Self {
        Self::new()
            .with(Arc::new(VoeExtractor))
            .with(Arc::new(DoodExtractor))
            .with(Arc::new(StreamtapeExtractor))
    }

    /// Every built-in extractor, wired to `config`.
    ///
    /// `classifier` identifies embed URLs returned by internal servers.
    pub fn standard(config: &ResolverConfig, classifier: &Classifier) -> Self {
        let embeds = Self::external();
        let internal = InternalExtractor::new(
            &config.internal,
            Deobfuscator::new(&config.schemes),
            classifier.clone(),
            embeds.clone(),
        );
        let player = PlayerExtractor::new(config.internal.site_url.clone());

        embeds.with(Arc::new(internal)).with(Arc::new(player))
    }

    #[must_use]
    pub fn with(mut self, extractor: Arc<dyn HosterExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn find(&self, identity: &HosterIdentity) -> Option<&Arc<dyn HosterExtractor>> {
        self.extractors.iter().find(|e| e.handles(identity))
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }
}

impl std::fmt::Debug for ExtractorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_registers_all_extractors() {
        let set = ExtractorSet::standard(&ResolverConfig::default(), &Classifier::default());
        assert_eq!(set.names(), vec!["voe", "doodstream", "streamtape", "internal", "player"]);
    }

    #[test]
    fn finds_extractor_per_identity() {
        let set = ExtractorSet::standard(&ResolverConfig::default(), &Classifier::default());
        assert_eq!(set.find(&HosterIdentity::Voe).unwrap().name(), "voe");
        assert_eq!(set.find(&HosterIdentity::Player).unwrap().name(), "player");
        assert_eq!(
            set.find(&HosterIdentity::Internal("sak".into())).unwrap().name(),
            "internal"
        );
        assert!(ExtractorSet::new().find(&HosterIdentity::Voe).is_none());
    }

    #[test]
    fn external_set_has_no_internal_or_player() {
        let set = ExtractorSet::external();
        assert_eq!(set.len(), 3);
        assert!(set.find(&HosterIdentity::Player).is_none());
        assert!(set.find(&HosterIdentity::Internal("sak".into())).is_none());
    }
}
