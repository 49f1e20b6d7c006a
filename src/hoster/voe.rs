//! Voe embeds.
//!
//! The embed page is sometimes a stub that bounces to a mirror through
//! `window.location.href`; the real page carries the manifest URL in a
//! `'hls'` source entry, either plain or base64-wrapped.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{playlist, HosterExtractor};
use crate::classify::{normalize_url, HosterIdentity};
use crate::deobfuscate::{Atob, Codec};
use crate::error::ExtractError;
use crate::http_client::HosterClient;
use crate::model::{Candidate, VideoStream};

static REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.location\.href\s*=\s*['"]([^'"]+)['"]"#).unwrap()
});

static HLS_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]hls['"]\s*:\s*['"]([^'"]+)['"]"#).unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct VoeExtractor;

#[async_trait]
impl HosterExtractor for VoeExtractor {
    fn name(&self) -> &'static str {
        "voe"
    }

    fn handles(&self, identity: &HosterIdentity) -> bool {
        matches!(identity, HosterIdentity::Voe)
    }

    async fn extract(
        &self,
        candidate: &Candidate,
        client: &HosterClient,
    ) -> Result<Vec<VideoStream>, ExtractError> {
        let url = normalize_url(&candidate.descriptor.raw_url);
        let (mut page, mut page_url) = client.get_text_with_url(&url, &[]).await?;

        if let Some(target) = redirect_target(&page) {
            debug!(from = %page_url, to = %target, "Following Voe redirect page");
            (page, page_url) = client.get_text_with_url(&target, &[]).await?;
        }

        let Some(manifest) = hls_source(&page, &page_url)? else {
            debug!(url = %page_url, "No hls source on Voe page");
            return Ok(Vec::new());
        };

        let headers = BTreeMap::from([("Referer".to_string(), page_url)]);
        playlist::expand(client, candidate, &manifest, &headers, &[]).await
    }
}

/// Redirect target of a stub page, if it only bounces.
fn redirect_target(page: &str) -> Option<String> {
    if HLS_SOURCE.is_match(page) {
        return None;
    }
    REDIRECT
        .captures(page)
        .map(|caps| normalize_url(&caps[1]))
}

/// The manifest URL from the player config, unwrapping base64 when needed.
fn hls_source(page: &str, page_url: &str) -> Result<Option<String>, ExtractError> {
    let Some(caps) = HLS_SOURCE.captures(page) else {
        return Ok(None);
    };
    let value = caps[1].trim();
    if value.starts_with("http") || value.starts_with("//") {
        return Ok(Some(normalize_url(value)));
    }

    let decoded = Atob::default().decode(value)?;
    if decoded.starts_with("http") {
        Ok(Some(decoded))
    } else {
        Err(ExtractError::malformed(page_url, "hls source is not a URL"))
    }
}
