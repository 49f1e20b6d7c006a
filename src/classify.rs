//! Candidate classification.
//!
//! Turns raw [`SourceDescriptor`]s into typed [`Candidate`]s. An ordered
//! list of [`ClassificationRule`]s is applied; the first rule that matches
//! decides the [`HosterIdentity`]. Descriptors that match nothing, or whose
//! identity the active [`HosterPolicy`](crate::config::HosterPolicy)
//! rejects, are dropped without error.
//!
//! Descriptor URLs carrying the XOR-hex marker are decoded first, for every
//! kind, so rules and extractors only ever see plain URLs. A descriptor that
//! fails to decode is dropped on its own.
//!
//! Classification is pure: the same descriptor and preference always give
//! the same answer.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::UserPreference;
use crate::deobfuscate::{Codec, XorHex};
use crate::model::{Candidate, SourceDescriptor, SourceKind};

/// Which extractor handles a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HosterIdentity {
    /// A first-party server reached through the site's own API, keyed by
    /// its lowercase name (`"sak"`, `"luf-mp4"`, ...).
    Internal(String),
    /// A direct link that needs no extraction.
    Player,
    Voe,
    Doodstream,
    Streamtape,
}

impl HosterIdentity {
    /// Stable key used in configuration and logs.
    pub fn key(&self) -> String {
        match self {
            Self::Internal(name) => format!("internal:{name}"),
            Self::Player => "player".to_string(),
            Self::Voe => "voe".to_string(),
            Self::Doodstream => "doodstream".to_string(),
            Self::Streamtape => "streamtape".to_string(),
        }
    }
}

impl fmt::Display for HosterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for HosterIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if let Some(name) = lower.strip_prefix("internal:") {
            if name.is_empty() {
                return Err(format!("empty internal hoster name in {s:?}"));
            }
            return Ok(Self::Internal(name.to_string()));
        }
        match lower.as_str() {
            "player" => Ok(Self::Player),
            "voe" => Ok(Self::Voe),
            "doodstream" | "dood" => Ok(Self::Doodstream),
            "streamtape" => Ok(Self::Streamtape),
            _ => Err(format!("unknown hoster {s:?}")),
        }
    }
}

impl TryFrom<String> for HosterIdentity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HosterIdentity> for String {
    fn from(identity: HosterIdentity) -> Self {
        identity.key()
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    UrlPrefix(String),
    UrlContains(String),
    /// Whole-word, case-insensitive match against the label.
    LabelWord(String),
    Any,
}

/// One `(predicate, identity)` pair.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    /// Restrict the rule to one descriptor kind.
    kind: Option<SourceKind>,
    matcher: Matcher,
    identity: HosterIdentity,
}

impl ClassificationRule {
    /// Case-insensitive prefix match on the (normalised) URL.
    pub fn url_prefix(prefix: &str, identity: HosterIdentity) -> Self {
        Self {
            kind: Some(SourceKind::External),
            matcher: Matcher::UrlPrefix(prefix.to_lowercase()),
            identity,
        }
    }

    /// Case-insensitive substring match on the (normalised) URL.
    pub fn url_contains(needle: &str, identity: HosterIdentity) -> Self {
        Self {
            kind: Some(SourceKind::External),
            matcher: Matcher::UrlContains(needle.to_lowercase()),
            identity,
        }
    }

    /// Internal server whose label contains `name` as a whole word.
    pub fn internal_name(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        Self {
            kind: Some(SourceKind::Internal),
            matcher: Matcher::LabelWord(name.clone()),
            identity: HosterIdentity::Internal(name),
        }
    }

    /// Every descriptor of `kind`.
    pub fn kind(kind: SourceKind, identity: HosterIdentity) -> Self {
        Self {
            kind: Some(kind),
            matcher: Matcher::Any,
            identity,
        }
    }

    pub fn identity(&self) -> &HosterIdentity {
        &self.identity
    }

    fn matches(&self, kind: Option<SourceKind>, url: &str, label: &str) -> bool {
        if let (Some(expected), Some(actual)) = (self.kind, kind) {
            if expected != actual {
                return false;
            }
        }
        match &self.matcher {
            Matcher::UrlPrefix(prefix) => url.starts_with(prefix.as_str()),
            Matcher::UrlContains(needle) => url.contains(needle.as_str()),
            Matcher::LabelWord(word) => contains_word(&label.to_lowercase(), word),
            Matcher::Any => true,
        }
    }
}

/// Internal servers known to the default rule set.
pub const DEFAULT_INTERNAL_HOSTERS: &[&str] = &["default", "luf-mp4", "s-mp4", "sak", "uv-mp4"];

/// Ordered rule table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    /// Decodes marker-prefixed descriptor URLs.
    url_codec: XorHex,
}

impl Classifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self {
            rules,
            url_codec: XorHex::default(),
        }
    }

    /// Default rules: the given internal servers, direct players, then the
    /// external hosters by domain.
    pub fn with_internal_hosters<S: AsRef<str>>(internal: &[S]) -> Self {
        let mut rules: Vec<ClassificationRule> = internal
            .iter()
            .map(|name| ClassificationRule::internal_name(name.as_ref()))
            .collect();
        rules.push(ClassificationRule::kind(
            SourceKind::Player,
            HosterIdentity::Player,
        ));
        rules.extend(external_rules());
        Self::new(rules)
    }

    /// Use `codec` for marker-prefixed descriptor URLs.
    #[must_use]
    pub fn with_url_codec(mut self, codec: XorHex) -> Self {
        self.url_codec = codec;
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: ClassificationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// First matching identity, or `None` when the descriptor is dropped.
    pub fn classify(
        &self,
        descriptor: &SourceDescriptor,
        preference: &UserPreference,
    ) -> Option<HosterIdentity> {
        let descriptor = self.decode(descriptor)?;
        self.identify(&descriptor, preference)
    }

    /// The descriptor with its URL decoded, or `None` if decoding fails.
    fn decode<'a>(&self, descriptor: &'a SourceDescriptor) -> Option<Cow<'a, SourceDescriptor>> {
        let raw = descriptor.raw_url.trim();
        if !raw.starts_with(self.url_codec.marker.as_str()) {
            return Some(Cow::Borrowed(descriptor));
        }
        match self.url_codec.decode(raw) {
            Ok(raw_url) => Some(Cow::Owned(SourceDescriptor {
                raw_url,
                ..descriptor.clone()
            })),
            Err(e) => {
                debug!(label = %descriptor.label, error = %e, "undecodable descriptor url");
                None
            }
        }
    }

    fn identify(
        &self,
        descriptor: &SourceDescriptor,
        preference: &UserPreference,
    ) -> Option<HosterIdentity> {
        let url = normalize_url(&descriptor.raw_url).to_lowercase();
        let identity = self
            .rules
            .iter()
            .find(|rule| rule.matches(Some(descriptor.kind), &url, &descriptor.label))
            .map(|rule| rule.identity.clone());

        match identity {
            Some(identity) if preference.hosters.permits(&identity) => Some(identity),
            Some(identity) => {
                debug!(%identity, label = %descriptor.label, "hoster disabled by policy");
                None
            }
            None => {
                debug!(url = %descriptor.raw_url, label = %descriptor.label, "no rule matched");
                None
            }
        }
    }

    /// Identify an embed URL discovered mid-extraction (no kind, no policy).
    pub fn classify_url(&self, url: &str) -> Option<HosterIdentity> {
        let url = normalize_url(url).to_lowercase();
        self.rules
            .iter()
            .filter(|rule| matches!(rule.matcher, Matcher::UrlPrefix(_) | Matcher::UrlContains(_)))
            .find(|rule| rule.matches(None, &url, ""))
            .map(|rule| rule.identity.clone())
    }

    /// Classify a whole descriptor set, preserving order.
    pub fn candidates(
        &self,
        descriptors: &[SourceDescriptor],
        preference: &UserPreference,
    ) -> Vec<Candidate> {
        descriptors
            .iter()
            .filter_map(|descriptor| {
                let descriptor = self.decode(descriptor)?.into_owned();
                let identity = self.identify(&descriptor, preference)?;
                let display_name = if preference.label_from_host {
                    host_display_name(&descriptor.raw_url)
                        .unwrap_or_else(|| descriptor.label.clone())
                } else {
                    descriptor.label.clone()
                };
                Some(Candidate {
                    descriptor,
                    identity,
                    display_name,
                })
            })
            .collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_internal_hosters(DEFAULT_INTERNAL_HOSTERS)
    }
}

fn external_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::url_contains("voe.sx", HosterIdentity::Voe),
        ClassificationRule::url_prefix("https://voe", HosterIdentity::Voe),
        ClassificationRule::url_prefix("https://dood", HosterIdentity::Doodstream),
        ClassificationRule::url_contains("ds2play.", HosterIdentity::Doodstream),
        ClassificationRule::url_contains("d000d.", HosterIdentity::Doodstream),
        ClassificationRule::url_contains("streamtape.", HosterIdentity::Streamtape),
        ClassificationRule::url_contains("strtape.", HosterIdentity::Streamtape),
        ClassificationRule::url_contains("stape.", HosterIdentity::Streamtape),
    ]
}

/// `needle` occurs in `haystack` delimited by non-word characters.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Protocol-relative URLs become `https://`.
pub fn normalize_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// Capitalised second-level domain: `https://www.filemoon.sx/e/1` -> `Filemoon`.
///
/// IP literals have no such name and give `None`.
pub fn host_display_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(&normalize_url(url)).ok()?;
    let host = match parsed.host()? {
        url::Host::Domain(host) => host,
        url::Host::Ipv4(_) | url::Host::Ipv6(_) => return None,
    };
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() < 2 {
        return None;
    }
    let name = parts[parts.len() - 2];
    let mut chars = name.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
