//! End-to-end resolution: classify, dispatch, rank.

use tracing::{info, instrument};

use crate::classify::Classifier;
use crate::config::{ResolverConfig, UserPreference};
use crate::dispatch::Dispatcher;
use crate::error::ResolveError;
use crate::hoster::ExtractorSet;
use crate::http_client::HosterClient;
use crate::model::{SourceDescriptor, VideoStream};
use crate::rank::rank;

/// Resolves descriptors into a ranked list of playable streams.
///
/// Holds no per-request state; one resolver serves any number of
/// concurrent `resolve` calls.
///
/// # Example
///
/// ```rust,no_run
/// use hosterkit::{load_config, Resolver, SourceDescriptor, SourceKind};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = load_config()?;
/// let resolver = Resolver::new(&config)?;
///
/// let descriptors = vec![SourceDescriptor::new(
///     "https://voe.sx/e/abc123",
///     "Voe",
///     SourceKind::External,
/// )];
/// for stream in resolver.resolve(&descriptors, &config.preferences).await? {
///     println!("{} {}", stream.quality_label, stream.playback_url);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Resolver {
    classifier: Classifier,
    dispatcher: Dispatcher,
}

impl Resolver {
    /// Default classifier and every built-in extractor, wired to `config`.
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let classifier = Classifier::with_internal_hosters(&config.internal.hoster_names);
        Self::with_classifier(config, classifier)
    }

    /// Like [`Resolver::new`] with a custom rule table. Descriptor URLs are
    /// decoded with the configured XOR-hex scheme.
    pub fn with_classifier(
        config: &ResolverConfig,
        classifier: Classifier,
    ) -> Result<Self, ResolveError> {
        let classifier = classifier.with_url_codec(config.schemes.xor_hex.clone());
        let client = HosterClient::with_config(&config.http)?;
        let extractors = ExtractorSet::standard(config, &classifier);
        let dispatcher =
            Dispatcher::new(extractors, client).with_max_concurrency(config.dispatch.max_concurrency);
        Ok(Self::from_parts(classifier, dispatcher))
    }

    pub fn from_parts(classifier: Classifier, dispatcher: Dispatcher) -> Self {
        Self {
            classifier,
            dispatcher,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Classify, extract concurrently and rank.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NoPlayableSources`] when nothing playable survives.
    /// Individual hoster failures are never reported here.
    #[instrument(skip_all, fields(descriptors = descriptors.len()))]
    pub async fn resolve(
        &self,
        descriptors: &[SourceDescriptor],
        preference: &UserPreference,
    ) -> Result<Vec<VideoStream>, ResolveError> {
        let candidates = self.classifier.candidates(descriptors, preference);
        let candidate_count = candidates.len();

        let streams = self.dispatcher.dispatch(candidates).await;
        if streams.is_empty() {
            return Err(ResolveError::NoPlayableSources {
                descriptors: descriptors.len(),
                candidates: candidate_count,
            });
        }

        let ranked = rank(streams, preference);
        info!(candidates = candidate_count, streams = ranked.len(), "Resolved");
        Ok(ranked)
    }
}
