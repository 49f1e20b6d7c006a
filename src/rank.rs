//! Deterministic best-first ordering of resolved streams.
//!
//! Keys, each consulted only when the previous ones tie:
//!
//! 1. preferred hoster name in the quality label, or source priority when
//!    no hoster is preferred
//! 2. preferred quality token in the label
//! 3. preferred subtitle language in the label
//! 4. numeric resolution mined from the label (`"1080p"` -> 1080)
//!
//! Label matches are case-insensitive substring checks. The sort is stable,
//! so full ties keep their input order and ranking is idempotent.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::UserPreference;
use crate::model::{SubtitleTrack, VideoStream};

static RESOLUTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)p").unwrap());

/// Order `streams` best-first and sort each stream's subtitles.
pub fn rank(streams: Vec<VideoStream>, preference: &UserPreference) -> Vec<VideoStream> {
    let hoster = preference
        .preferred_hoster_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase);
    let quality = preference.preferred_quality_token.to_lowercase();
    let language = preference.preferred_subtitle_language.to_lowercase();

    let mut keyed: Vec<(SortKey, VideoStream)> = streams
        .into_iter()
        .map(|mut stream| {
            stream.subtitle_tracks =
                order_subtitles(std::mem::take(&mut stream.subtitle_tracks), preference);
            let label = stream.quality_label.to_lowercase();
            let key = SortKey {
                hoster: hoster.as_deref().map(|h| matches(&label, h)),
                priority: stream.source_priority,
                quality: matches(&label, &quality),
                language: matches(&label, &language),
                resolution: resolution_of(&stream.quality_label),
            };
            (key, stream)
        })
        .collect();

    // Descending on every key; stable
    keyed.sort_by(|(a, _), (b, _)| b.compare(a));
    keyed.into_iter().map(|(_, stream)| stream).collect()
}

/// Tracks whose language label mentions the preferred language first.
pub fn order_subtitles(
    mut tracks: Vec<SubtitleTrack>,
    preference: &UserPreference,
) -> Vec<SubtitleTrack> {
    let language = preference.preferred_subtitle_language.to_lowercase();
    tracks.sort_by_key(|track| !matches(&track.language_label.to_lowercase(), &language));
    tracks
}

/// First `<digits>p` in a label, 0 if none.
pub fn resolution_of(label: &str) -> u32 {
    RESOLUTION
        .captures(label)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// Empty needles never match.
fn matches(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.contains(needle)
}

struct SortKey {
    /// `Some` when a hoster is preferred.
    hoster: Option<bool>,
    priority: f32,
    quality: bool,
    language: bool,
    resolution: u32,
}

impl SortKey {
    fn compare(&self, other: &Self) -> Ordering {
        let first = match (self.hoster, other.hoster) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.priority.total_cmp(&other.priority),
        };
        first
            .then(self.quality.cmp(&other.quality))
            .then(self.language.cmp(&other.language))
            .then(self.resolution.cmp(&other.resolution))
    }
}
