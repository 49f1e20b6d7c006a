//! Concurrent fan-out of candidates to their extractors.
//!
//! Every candidate runs in its own tokio task. A failing, panicking or
//! unsupported candidate contributes zero streams and is logged; it never
//! affects its siblings. Wall time is bounded by the slowest candidate,
//! not the sum of all of them.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::error::ExtractError;
use crate::hoster::ExtractorSet;
use crate::http_client::HosterClient;
use crate::model::{Candidate, VideoStream};

/// Runs extractions concurrently and flattens the results.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    extractors: Arc<ExtractorSet>,
    client: HosterClient,
    semaphore: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    /// Unbounded dispatcher over `extractors`, sharing `client`.
    pub fn new(extractors: ExtractorSet, client: HosterClient) -> Self {
        Self {
            extractors: Arc::new(extractors),
            client,
            semaphore: None,
        }
    }

    /// Cap simultaneous extractions. `None` or `Some(0)` means unbounded.
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.semaphore = limit
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    pub fn extractors(&self) -> &ExtractorSet {
        &self.extractors
    }

    /// Extract every candidate and return all streams, in candidate order.
    ///
    /// Never fails. If this future is dropped, spawned tasks keep running
    /// until they finish or time out and their results are discarded.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn dispatch(&self, candidates: Vec<Candidate>) -> Vec<VideoStream> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut labels = Vec::with_capacity(candidates.len());
        let mut tasks = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            labels.push((candidate.identity.clone(), candidate.descriptor.raw_url.clone()));

            let extractors = Arc::clone(&self.extractors);
            let client = self.client.clone();
            let semaphore = self.semaphore.clone();

            tasks.push(tokio::spawn(async move {
                // Held until the extraction finishes
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                extract_one(&extractors, &candidate, &client).await
            }));
        }

        let mut streams = Vec::new();
        let mut failed = 0usize;

        for ((identity, url), outcome) in labels.into_iter().zip(join_all(tasks).await) {
            match outcome {
                Ok(Ok(found)) => {
                    debug!(%identity, url = %url, count = found.len(), "Candidate extracted");
                    streams.extend(found);
                }
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(
                        %identity,
                        url = %url,
                        timeout = e.is_timeout(),
                        error = %e,
                        "Extraction failed"
                    );
                }
                Err(e) => {
                    failed += 1;
                    warn!(%identity, url = %url, error = %e, "Extraction task aborted");
                }
            }
        }

        info!(streams = streams.len(), failed, "Dispatch complete");
        streams
    }
}

async fn extract_one(
    extractors: &ExtractorSet,
    candidate: &Candidate,
    client: &HosterClient,
) -> Result<Vec<VideoStream>, ExtractError> {
    let extractor = extractors
        .find(&candidate.identity)
        .ok_or_else(|| ExtractError::Unsupported(candidate.identity.clone()))?;
    extractor.extract(candidate, client).await
}
