//! Doodstream embeds.
//!
//! Two steps: the embed page names a `/pass_md5/` endpoint, which returns
//! the start of the media URL. The player appends a random suffix plus the
//! token and an expiry timestamp.

use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::HosterExtractor;
use crate::classify::{normalize_url, HosterIdentity};
use crate::error::ExtractError;
use crate::http_client::HosterClient;
use crate::model::{Candidate, VideoStream};

static PASS_MD5: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/pass_md5/([\w\-/]+)").unwrap());

static TITLE_RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{3,4})p\b").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct DoodExtractor;

#[async_trait]
impl HosterExtractor for DoodExtractor {
    fn name(&self) -> &'static str {
        "doodstream"
    }

    fn handles(&self, identity: &HosterIdentity) -> bool {
        matches!(identity, HosterIdentity::Doodstream)
    }

    async fn extract(
        &self,
        candidate: &Candidate,
        client: &HosterClient,
    ) -> Result<Vec<VideoStream>, ExtractError> {
        let url = embed_url(&candidate.descriptor.raw_url);
        let (page, page_url) = client.get_text_with_url(&url, &[]).await?;

        let Some(pass_path) = pass_md5_path(&page) else {
            debug!(url = %page_url, "No pass_md5 endpoint, file likely removed");
            return Ok(Vec::new());
        };
        let origin = origin_of(&page_url)
            .ok_or_else(|| ExtractError::malformed(&page_url, "embed URL has no host"))?;

        let pass_url = format!("{origin}/pass_md5/{pass_path}");
        let base = client
            .get_text(&pass_url, &[("Referer", page_url.as_str())])
            .await?;
        let base = base.trim();
        if !base.starts_with("http") {
            return Ok(Vec::new());
        }

        let token = pass_path.rsplit('/').next().unwrap_or_default();
        let playback_url = format!(
            "{base}{}?token={token}&expiry={}",
            random_suffix(),
            now_millis()
        );
        let detail = title_resolution(&page).unwrap_or_default();

        Ok(vec![candidate
            .stream(playback_url, &detail)
            .with_header("Referer", format!("{origin}/"))])
    }
}

/// Download pages (`/d/`) carry no player; the embed (`/e/`) does.
fn embed_url(raw_url: &str) -> String {
    normalize_url(raw_url).replacen("/d/", "/e/", 1)
}

fn pass_md5_path(page: &str) -> Option<String> {
    PASS_MD5.captures(page).map(|caps| caps[1].to_string())
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

/// `"720p"` when the page title names a resolution.
fn title_resolution(page: &str) -> Option<String> {
    let document = Html::parse_document(page);
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>();
    TITLE_RESOLUTION
        .captures(&title)
        .map(|caps| format!("{}p", &caps[1]))
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Show S01E01 1080p - DoodStream</title></head>
<body><script>
$.get('/pass_md5/12345-67-89/abcdeftoken', function(data) { makePlay(data) });
</script></body></html>"#;

    #[test]
    fn finds_pass_md5_path() {
        assert_eq!(pass_md5_path(PAGE).as_deref(), Some("12345-67-89/abcdeftoken"));
        assert_eq!(pass_md5_path("<html>File not found</html>"), None);
    }

    #[test]
    fn rewrites_download_links() {
        assert_eq!(embed_url("https://dood.li/d/abc"), "https://dood.li/e/abc");
        assert_eq!(embed_url("//dood.li/e/abc"), "https://dood.li/e/abc");
    }

    #[test]
    fn origin_keeps_port() {
        assert_eq!(origin_of("https://dood.li/e/abc").as_deref(), Some("https://dood.li"));
        assert_eq!(
            origin_of("http://127.0.0.1:8080/e/abc").as_deref(),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn resolution_from_title() {
        assert_eq!(title_resolution(PAGE).as_deref(), Some("1080p"));
        assert_eq!(title_resolution("<title>No quality here</title>"), None);
    }

    #[test]
    fn suffix_is_alphanumeric() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
