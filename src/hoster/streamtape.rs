//! Streamtape embeds.
//!
//! The media link is assembled in an inline script:
//! `document.getElementById('robotlink').innerHTML = '//host/get_video?id=..' + ('xcdtoken=..').substring(1).substring(2);`

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::HosterExtractor;
use crate::classify::{normalize_url, HosterIdentity};
use crate::error::ExtractError;
use crate::http_client::HosterClient;
use crate::model::{Candidate, VideoStream};

static ROBOTLINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"getElementById\(\s*['"]robotlink['"]\s*\)\.innerHTML\s*=\s*['"]([^'"]*)['"]\s*\+\s*\(\s*['"]([^'"]*)['"]\s*\)((?:\.substring\(\d+\))*)"#,
    )
    .unwrap()
});

static SUBSTRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.substring\((\d+)\)").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamtapeExtractor;

#[async_trait]
impl HosterExtractor for StreamtapeExtractor {
    fn name(&self) -> &'static str {
        "streamtape"
    }

    fn handles(&self, identity: &HosterIdentity) -> bool {
        matches!(identity, HosterIdentity::Streamtape)
    }

    async fn extract(
        &self,
        candidate: &Candidate,
        client: &HosterClient,
    ) -> Result<Vec<VideoStream>, ExtractError> {
        let url = normalize_url(&candidate.descriptor.raw_url);
        let page = client.get_text(&url, &[]).await?;

        let Some(playback_url) = robotlink(&page) else {
            debug!(url = %url, "No robotlink script on Streamtape page");
            return Ok(Vec::new());
        };

        Ok(vec![candidate.stream(playback_url, "")])
    }
}

/// Reassemble the media URL from the page's inline scripts.
fn robotlink(page: &str) -> Option<String> {
    let document = Html::parse_document(page);
    let selector = Selector::parse("script").ok()?;

    let script = document
        .select(&selector)
        .map(|script| script.text().collect::<String>())
        .filter(|text| text.contains("robotlink"))
        .last()?;

    // Decoy assignments come first; the player uses the last one
    let caps = ROBOTLINK.captures_iter(&script).last()?;
    let mut tail: String = caps[2].to_string();
    for cut in SUBSTRING.captures_iter(&caps[3]) {
        let skip: usize = cut[1].parse().ok()?;
        tail = tail.chars().skip(skip).collect();
    }

    Some(normalize_url(&format!("{}{tail}", &caps[1])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_link() {
        let page = r#"<html><body>
<div id="robotlink">//streamtape.com/get_video?id=abc</div>
<script>
document.getElementById('norobotlink').innerHTML = '//streamtape.com/get_video?id=decoy' + ('xyz').substring(1);
document.getElementById('robotlink').innerHTML = '//streamtape.com/get_vid' + ('xcdeo?id=abc&expires=1&token=t0k').substring(1).substring(2);
</script></body></html>"#;
        assert_eq!(
            robotlink(page).as_deref(),
            Some("https://streamtape.com/get_video?id=abc&expires=1&token=t0k")
        );
    }

    #[test]
    fn single_substring() {
        let page = "<script>document.getElementById('robotlink').innerHTML = 'https://st.example/get_video?id=1' + ('x&token=2').substring(1);</script>";
        assert_eq!(
            robotlink(page).as_deref(),
            Some("https://st.example/get_video?id=1&token=2")
        );
    }

    #[test]
    fn missing_script_yields_none() {
        assert_eq!(robotlink("<html><script>var a = 1;</script></html>"), None);
        assert_eq!(robotlink("<html><body>Video not found</body></html>"), None);
    }
}
