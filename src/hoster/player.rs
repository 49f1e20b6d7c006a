//! Direct player links. No network round-trip.

use async_trait::async_trait;

use super::HosterExtractor;
use crate::classify::{normalize_url, HosterIdentity};
use crate::error::ExtractError;
use crate::http_client::HosterClient;
use crate::model::{Candidate, VideoStream};

#[derive(Debug, Clone, Default)]
pub struct PlayerExtractor {
    /// Sent as `Origin`/`Referer` so the CDN accepts the playback request.
    site_url: Option<String>,
}

impl PlayerExtractor {
    pub fn new(site_url: Option<String>) -> Self {
        Self { site_url }
    }
}

#[async_trait]
impl HosterExtractor for PlayerExtractor {
    fn name(&self) -> &'static str {
        "player"
    }

    fn handles(&self, identity: &HosterIdentity) -> bool {
        matches!(identity, HosterIdentity::Player)
    }

    async fn extract(
        &self,
        candidate: &Candidate,
        _client: &HosterClient,
    ) -> Result<Vec<VideoStream>, ExtractError> {
        let url = normalize_url(candidate.descriptor.raw_url.trim());
        if url.is_empty() {
            return Ok(Vec::new());
        }

        let mut stream = candidate.stream(url, "");
        if let Some(site) = &self.site_url {
            stream = stream
                .with_header("Origin", site.trim_end_matches('/'))
                .with_header("Referer", site.as_str());
        }
        Ok(vec![stream])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceDescriptor, SourceKind};

    fn candidate(url: &str) -> Candidate {
        Candidate {
            descriptor: SourceDescriptor::new(url, "Direct", SourceKind::Player)
                .with_language_tag("Dub"),
            identity: HosterIdentity::Player,
            display_name: "Direct".to_string(),
        }
    }

    #[tokio::test]
    async fn passes_link_through() {
        let client = HosterClient::new().unwrap();
        let extractor = PlayerExtractor::new(Some("https://site.example/".to_string()));

        let streams = extractor
            .extract(&candidate("//cdn.example/v.mp4"), &client)
            .await
            .unwrap();

        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].playback_url, "https://cdn.example/v.mp4");
        assert_eq!(streams[0].quality_label, "Direct (Dub)");
        assert_eq!(streams[0].request_headers["Origin"], "https://site.example");
        assert_eq!(streams[0].request_headers["Referer"], "https://site.example/");
    }

    #[tokio::test]
    async fn empty_link_yields_nothing() {
        let client = HosterClient::new().unwrap();
        let streams = PlayerExtractor::default()
            .extract(&candidate("  "), &client)
            .await
            .unwrap();
        assert!(streams.is_empty());
    }
}
