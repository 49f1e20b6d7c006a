//! Pipeline data model.
//!
//! [`SourceDescriptor`]s come in from the scraping layer, [`Candidate`]s
//! flow from the classifier to the dispatcher, and [`VideoStream`]s come
//! out the other end, ranked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::HosterIdentity;

/// Coarse handling hint announced by the upstream site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Needs a site-specific secondary API call.
    Internal,
    /// Already a directly playable link.
    Player,
    /// Third-party hoster page that needs full extraction.
    External,
}

/// One raw, pre-classification reference to a hoster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Opaque or plain URL/token supplied by the page or API.
    pub raw_url: String,
    /// Server name as announced by the site. Not trusted.
    pub label: String,
    pub kind: SourceKind,
    /// Editorial ranking hint. Only ever used as a sort key.
    #[serde(default)]
    pub priority_weight: f32,
    /// Audio/subtitle tag appended to every produced label, e.g. `"EN Sub"`.
    #[serde(default)]
    pub language_tag: Option<String>,
}

impl SourceDescriptor {
    pub fn new(raw_url: impl Into<String>, label: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            raw_url: raw_url.into(),
            label: label.into(),
            kind,
            priority_weight: 0.0,
            language_tag: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, weight: f32) -> Self {
        self.priority_weight = weight;
        self
    }

    #[must_use]
    pub fn with_language_tag(mut self, tag: impl Into<String>) -> Self {
        self.language_tag = Some(tag.into());
        self
    }
}

/// A descriptor that survived classification, ready for extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub descriptor: SourceDescriptor,
    pub identity: HosterIdentity,
    /// Name used as the prefix of every quality label this candidate yields.
    pub display_name: String,
}

impl Candidate {
    /// Build a quality label: `"<display name> - <detail> (<language tag>)"`.
    ///
    /// An empty `detail` drops the `" - "` separator.
    pub fn label(&self, detail: &str) -> String {
        let mut label = self.display_name.clone();
        if !detail.is_empty() {
            label.push_str(" - ");
            label.push_str(detail);
        }
        if let Some(tag) = &self.descriptor.language_tag {
            label.push_str(" (");
            label.push_str(tag);
            label.push(')');
        }
        label
    }

    /// Start a stream that inherits this candidate's priority.
    pub fn stream(&self, playback_url: impl Into<String>, detail: &str) -> VideoStream {
        VideoStream {
            playback_url: playback_url.into(),
            quality_label: self.label(detail),
            request_headers: BTreeMap::new(),
            subtitle_tracks: Vec::new(),
            source_priority: self.descriptor.priority_weight,
        }
    }
}

/// External subtitle file attached to a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub url: String,
    pub language_label: String,
}

/// A resolved, independently fetchable stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub playback_url: String,
    /// Free text such as `"Voe - 1080p (EN Sub)"`; mined by the ranker.
    pub quality_label: String,
    /// Headers the consumer must send when fetching `playback_url`.
    pub request_headers: BTreeMap<String, String>,
    pub subtitle_tracks: Vec<SubtitleTrack>,
    pub source_priority: f32,
}

impl VideoStream {
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        self.request_headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn with_subtitles(mut self, tracks: Vec<SubtitleTrack>) -> Self {
        self.subtitle_tracks = tracks;
        self
    }
}
