//! First-party servers reached through the site's own streaming API.
//!
//! The descriptor URL is an XOR-hex encoded API path. The API answers
//! either with a list of direct links or with a single VRF-sealed embed
//! URL, which is classified and handed to the matching third-party
//! extractor.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{playlist, ExtractorSet, HosterExtractor};
use crate::classify::{normalize_url, Classifier, HosterIdentity};
use crate::config::InternalConfig;
use crate::deobfuscate::{Deobfuscator, SchemeId};
use crate::error::ExtractError;
use crate::http_client::HosterClient;
use crate::model::{Candidate, SourceDescriptor, SubtitleTrack, VideoStream};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiReply {
    Links { links: Vec<ApiLink> },
    Sealed { result: SealedEmbed },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiLink {
    link: String,
    #[serde(default)]
    hls: Option<bool>,
    #[serde(default)]
    resolution_str: String,
    #[serde(default)]
    subtitles: Vec<ApiSubtitle>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl ApiLink {
    fn is_hls(&self) -> bool {
        self.hls.unwrap_or_else(|| self.link.contains(".m3u8"))
    }
}

#[derive(Debug, Deserialize)]
struct ApiSubtitle {
    src: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    lang: Option<String>,
}

impl From<ApiSubtitle> for SubtitleTrack {
    fn from(sub: ApiSubtitle) -> Self {
        Self {
            url: normalize_url(&sub.src),
            language_label: sub
                .label
                .or(sub.lang)
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SealedEmbed {
    url: String,
}

pub struct InternalExtractor {
    api_base: String,
    site_url: Option<String>,
    sign_requests: bool,
    skip_raw: bool,
    deobfuscator: Deobfuscator,
    /// Identifies unsealed embed URLs.
    classifier: Classifier,
    embeds: ExtractorSet,
}

impl InternalExtractor {
    pub fn new(
        config: &InternalConfig,
        deobfuscator: Deobfuscator,
        classifier: Classifier,
        embeds: ExtractorSet,
    ) -> Self {
        Self {
            api_base: config.api_base.clone(),
            site_url: config.site_url.clone(),
            sign_requests: config.sign_requests,
            skip_raw: config.skip_raw,
            deobfuscator,
            classifier,
            embeds,
        }
    }

    /// Decode the descriptor into the full API URL, signing it if enabled.
    fn api_url(&self, raw_url: &str) -> Result<String, ExtractError> {
        let path = self.deobfuscator.decode(raw_url.trim(), SchemeId::XorHex)?;
        let url = playlist::resolve_url(&self.api_base, &path);
        if !self.sign_requests {
            return Ok(url);
        }

        let id = request_id(&url).ok_or_else(|| ExtractError::malformed(&url, "no id to sign"))?;
        let query = self.deobfuscator.vrf_query(&id)?;
        let separator = if url.contains('?') { '&' } else { '?' };
        Ok(format!("{url}{separator}{query}"))
    }

    fn site_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if let Some(site) = &self.site_url {
            headers.insert("Origin".to_string(), site.trim_end_matches('/').to_string());
            headers.insert("Referer".to_string(), site.clone());
        }
        headers
    }

    async fn direct_links(
        &self,
        candidate: &Candidate,
        client: &HosterClient,
        links: Vec<ApiLink>,
    ) -> Vec<VideoStream> {
        let mut streams = Vec::new();

        for link in links {
            if self.skip_raw && link.resolution_str.to_lowercase().contains("raw") {
                debug!(resolution = %link.resolution_str, "Skipping raw link");
                continue;
            }

            let url = normalize_url(link.link.trim());
            let hls = link.is_hls();
            let mut headers = self.site_headers();
            headers.extend(link.headers);
            let subtitles: Vec<SubtitleTrack> =
                link.subtitles.into_iter().map(SubtitleTrack::from).collect();

            if hls {
                match playlist::expand(client, candidate, &url, &headers, &subtitles).await {
                    Ok(expanded) => streams.extend(expanded),
                    Err(e) => warn!(url = %url, error = %e, "Internal manifest failed"),
                }
            } else {
                streams.push(
                    candidate
                        .stream(url, link.resolution_str.trim())
                        .with_headers(&headers)
                        .with_subtitles(subtitles),
                );
            }
        }

        streams
    }

    async fn unseal(
        &self,
        candidate: &Candidate,
        client: &HosterClient,
        sealed: &str,
    ) -> Result<Vec<VideoStream>, ExtractError> {
        let embed_url = normalize_url(&self.deobfuscator.decode(sealed, SchemeId::Vrf)?);

        let Some(identity) = self.classifier.classify_url(&embed_url) else {
            debug!(url = %embed_url, "Unsealed embed matches no hoster");
            return Ok(Vec::new());
        };
        let extractor = self
            .embeds
            .find(&identity)
            .ok_or_else(|| ExtractError::Unsupported(identity.clone()))?;

        debug!(%identity, url = %embed_url, "Following unsealed embed");
        let embed = Candidate {
            descriptor: SourceDescriptor {
                raw_url: embed_url,
                ..candidate.descriptor.clone()
            },
            identity,
            display_name: candidate.display_name.clone(),
        };
        extractor.extract(&embed, client).await
    }
}

#[async_trait]
impl HosterExtractor for InternalExtractor {
    fn name(&self) -> &'static str {
        "internal"
    }

    fn handles(&self, identity: &HosterIdentity) -> bool {
        matches!(identity, HosterIdentity::Internal(_))
    }

    async fn extract(
        &self,
        candidate: &Candidate,
        client: &HosterClient,
    ) -> Result<Vec<VideoStream>, ExtractError> {
        let url = self.api_url(&candidate.descriptor.raw_url)?;
        let headers = self.site_headers();
        let pairs: Vec<(&str, &str)> = headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        match client.get_json::<ApiReply>(&url, &pairs).await? {
            ApiReply::Links { links } => Ok(self.direct_links(candidate, client, links).await),
            ApiReply::Sealed { result } => self.unseal(candidate, client, &result.url).await,
        }
    }
}

/// The `id` query parameter, or the last path segment.
fn request_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "id") {
        return Some(id.into_owned());
    }
    parsed
        .path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::{Codec, SchemeConfig, Vrf, XorHex};

    fn extractor(sign: bool) -> InternalExtractor {
        let config = InternalConfig {
            api_base: "https://api.example.org".to_string(),
            site_url: Some("https://example.org/".to_string()),
            sign_requests: sign,
            ..InternalConfig::default()
        };
        let schemes = SchemeConfig {
            vrf: Some(Vrf::new("enc", "dec")),
            ..SchemeConfig::default()
        };
        InternalExtractor::new(
            &config,
            Deobfuscator::new(&schemes),
            Classifier::default(),
            ExtractorSet::external(),
        )
    }

    #[test]
    fn decodes_path_onto_api_base() {
        let encoded = XorHex::default().encode("/apivtwo/clock?id=abc");
        let url = extractor(false).api_url(&encoded).unwrap();
        assert_eq!(url, "https://api.example.org/apivtwo/clock?id=abc");
    }

    #[test]
    fn plain_paths_pass_through() {
        let url = extractor(false).api_url("/ajax/server/42").unwrap();
        assert_eq!(url, "https://api.example.org/ajax/server/42");
    }

    #[test]
    fn signs_request_with_id() {
        let url = extractor(true).api_url("/ajax/server/42").unwrap();
        let expected = Vrf::new("enc", "dec").sign_query("42");
        assert_eq!(url, format!("https://api.example.org/ajax/server/42?{expected}"));

        let url = extractor(true).api_url("/clock?id=7").unwrap();
        assert!(url.starts_with("https://api.example.org/clock?id=7&vrf="));
    }

    #[test]
    fn bad_hex_is_decode_error() {
        let err = extractor(false).api_url("--zz").unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }

    #[test]
    fn request_id_sources() {
        assert_eq!(request_id("https://a.b/x/y?id=9").as_deref(), Some("9"));
        assert_eq!(request_id("https://a.b/x/y/").as_deref(), Some("y"));
        assert_eq!(request_id("https://a.b/"), None);
    }

    #[test]
    fn parses_both_reply_shapes() {
        let links: ApiReply = serde_json::from_str(
            r#"{"links":[{"link":"https://cdn/v.m3u8","hls":true,"resolutionStr":"Mp4",
                "subtitles":[{"src":"//cdn/en.vtt","lang":"en","label":"English"}]}]}"#,
        )
        .unwrap();
        let ApiReply::Links { links } = links else {
            panic!("expected links");
        };
        assert!(links[0].is_hls());
        assert_eq!(links[0].resolution_str, "Mp4");
        let sub = SubtitleTrack::from(links.into_iter().next().unwrap().subtitles.remove(0));
        assert_eq!(sub.url, "https://cdn/en.vtt");
        assert_eq!(sub.language_label, "English");

        let sealed: ApiReply = serde_json::from_str(r#"{"result":{"url":"abc"}}"#).unwrap();
        assert!(matches!(sealed, ApiReply::Sealed { result } if result.url == "abc"));

        assert!(serde_json::from_str::<ApiReply>(r#"{"status":"error"}"#).is_err());
    }

    #[test]
    fn hls_flag_falls_back_to_extension() {
        let link: ApiLink = serde_json::from_str(r#"{"link":"https://cdn/master.m3u8"}"#).unwrap();
        assert!(link.is_hls());
        let link: ApiLink = serde_json::from_str(r#"{"link":"https://cdn/v.mp4"}"#).unwrap();
        assert!(!link.is_hls());
    }
}
