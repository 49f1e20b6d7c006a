//! HLS master playlist expansion.
//!
//! Turns one adaptive manifest URL into one [`VideoStream`] per bitrate
//! variant so the ranker can pick a resolution.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::ExtractError;
use crate::http_client::HosterClient;
use crate::model::{Candidate, SubtitleTrack, VideoStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsVariant {
    pub bandwidth: u64,
    /// Vertical resolution, 0 when the playlist doesn't say.
    pub height: u32,
    pub uri: String,
}

impl HlsVariant {
    /// `"1080p"`, or `"2500kbps"` without a resolution.
    pub fn detail(&self) -> String {
        if self.height > 0 {
            format!("{}p", self.height)
        } else {
            format!("{}kbps", self.bandwidth / 1000)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    /// Variants sorted by bandwidth, highest first.
    Master(Vec<HlsVariant>),
    /// A single-rendition media playlist.
    Media,
}

/// Parse a playlist body fetched from `url`.
pub fn parse_manifest(content: &str, url: &str) -> Result<Manifest, ExtractError> {
    if !content.trim_start().starts_with("#EXTM3U") {
        return Err(ExtractError::malformed(url, "missing #EXTM3U header"));
    }
    if !content.contains("#EXT-X-STREAM-INF:") {
        return Ok(Manifest::Media);
    }

    let mut variants = Vec::new();
    // Attributes of the last `#EXT-X-STREAM-INF` still waiting for its URI
    let mut pending: Option<(u64, u32)> = None;

    for line in content.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let attrs = parse_attributes(rest);
            let bandwidth = attrs
                .get("BANDWIDTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let height = attrs
                .get("RESOLUTION")
                .and_then(|r| r.split('x').nth(1))
                .and_then(|h| h.parse().ok())
                .unwrap_or(0);
            pending = Some((bandwidth, height));
        } else if line.is_empty() || line.starts_with('#') {
            continue;
        } else if let Some((bandwidth, height)) = pending.take() {
            variants.push(HlsVariant {
                bandwidth,
                height,
                uri: resolve_url(url, line),
            });
        }
    }

    // Stable, so equal-bandwidth variants keep playlist order
    variants.sort_by(|a, b| b.bandwidth.cmp(&a.bandwidth));
    Ok(Manifest::Master(variants))
}

/// Fetch `manifest_url` and build one stream per variant.
///
/// `headers` are sent with the manifest request and attached to every
/// stream. A master with no variants yields no streams.
pub async fn expand(
    client: &HosterClient,
    candidate: &Candidate,
    manifest_url: &str,
    headers: &BTreeMap<String, String>,
    subtitles: &[SubtitleTrack],
) -> Result<Vec<VideoStream>, ExtractError> {
    let pairs: Vec<(&str, &str)> = headers
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let content = client.get_text(manifest_url, &pairs).await?;

    let streams = match parse_manifest(&content, manifest_url)? {
        Manifest::Master(variants) => {
            debug!(count = variants.len(), url = %manifest_url, "Expanded master playlist");
            variants
                .iter()
                .map(|v| candidate.stream(v.uri.clone(), &v.detail()))
                .collect()
        }
        Manifest::Media => vec![candidate.stream(manifest_url, "")],
    };

    Ok(streams
        .into_iter()
        .map(|s| s.with_headers(headers).with_subtitles(subtitles.to_vec()))
        .collect())
}

fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut chars = attr_str.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|&c| c != '=').collect();
        if key.is_empty() {
            break;
        }

        // Quoted values may contain commas
        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let v: String = chars.by_ref().take_while(|&c| c != '"').collect();
            chars.next();
            v
        } else {
            chars.by_ref().take_while(|&c| c != ',').collect()
        };

        attrs.insert(key.trim().to_string(), value.trim().to_string());
    }

    attrs
}

/// Resolve a playlist URI against the playlist's own URL.
pub fn resolve_url(base: &str, relative: &str) -> String {
    url::Url::parse(base)
        .and_then(|b| b.join(relative))
        .map_or_else(|_| relative.to_string(), String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080,CODECS=\"avc1.640028,mp4a.40.2\"
1080/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000
https://cdn2.example.com/720/index.m3u8
";

    #[test]
    fn parses_and_sorts_master() {
        let Manifest::Master(variants) =
            parse_manifest(MASTER, "https://cdn.example.com/hls/master.m3u8").unwrap()
        else {
            panic!("expected master");
        };
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].height, 1080);
        assert_eq!(variants[0].uri, "https://cdn.example.com/hls/1080/index.m3u8");
        assert_eq!(variants[1].detail(), "2500kbps");
        assert_eq!(variants[1].uri, "https://cdn2.example.com/720/index.m3u8");
        assert_eq!(variants[2].detail(), "360p");
    }

    #[test]
    fn media_playlist_and_bad_bodies() {
        let media = "#EXTM3U\n#EXTINF:10,\nseg0.ts\n#EXT-X-ENDLIST\n";
        assert_eq!(parse_manifest(media, "https://x/y.m3u8").unwrap(), Manifest::Media);

        let err = parse_manifest("<html>blocked</html>", "https://x/y.m3u8").unwrap_err();
        assert!(matches!(err, ExtractError::MalformedBody { .. }));
    }

    #[test]
    fn master_without_uris_is_empty() {
        let dangling = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n";
        assert_eq!(
            parse_manifest(dangling, "https://x/m.m3u8").unwrap(),
            Manifest::Master(vec![])
        );
    }

    #[test]
    fn blank_and_comment_lines_before_uri_are_skipped() {
        let spaced = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720

# rendition note
720.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080.m3u8
";
        let Manifest::Master(variants) = parse_manifest(spaced, "https://x/m.m3u8").unwrap()
        else {
            panic!("expected master");
        };
        let heights: Vec<u32> = variants.iter().map(|v| v.height).collect();
        assert_eq!(heights, vec![1080, 720]);
        assert_eq!(variants[1].uri, "https://x/720.m3u8");
    }

    #[test]
    fn variant_without_uri_does_not_swallow_the_next() {
        let dangling = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080.m3u8
";
        assert_eq!(
            parse_manifest(dangling, "https://x/m.m3u8").unwrap(),
            Manifest::Master(vec![HlsVariant {
                bandwidth: 5_000_000,
                height: 1080,
                uri: "https://x/1080.m3u8".to_string(),
            }])
        );
    }

    #[test]
    fn test_parse_attributes() {
        let attrs = parse_attributes("BANDWIDTH=1280000,RESOLUTION=720x480");
        assert_eq!(attrs.get("BANDWIDTH"), Some(&"1280000".to_string()));
        assert_eq!(attrs.get("RESOLUTION"), Some(&"720x480".to_string()));

        let attrs2 = parse_attributes("CODECS=\"avc1.4d401f,mp4a.40.2\",BANDWIDTH=2000000");
        assert_eq!(attrs2.get("CODECS"), Some(&"avc1.4d401f,mp4a.40.2".to_string()));
        assert_eq!(attrs2.get("BANDWIDTH"), Some(&"2000000".to_string()));
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://example.com/path/master.m3u8", "video.m3u8"),
            "https://example.com/path/video.m3u8"
        );
        assert_eq!(
            resolve_url("https://example.com/path/master.m3u8", "/video.m3u8"),
            "https://example.com/video.m3u8"
        );
        assert_eq!(
            resolve_url("not a url", "https://cdn.example.com/v.m3u8"),
            "https://cdn.example.com/v.m3u8"
        );
    }
}
