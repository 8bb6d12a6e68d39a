//! Lexical URL feature extraction.
//!
//! Every URL maps to a fixed-length `Vec<f64>` whose layout is defined by a
//! [`FeatureSet`]:
//! - `Lexical` (8 values, used for training): url_length, num_dots, has_ip,
//!   has_https, has_at, has_dash, num_suspicious_words, domain_length
//! - `Compact` (5 values): url_length, num_dots, has_digit, has_https,
//!   special_char_count
//!
//! Extraction never fails. An [`UrlInput::Invalid`] value maps to the all-zero
//! vector of the requested set.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;

use psl::Type;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

const SUSPICIOUS_WORDS: [&str; 5] = ["login", "verify", "update", "free", "secure"];
const SPECIAL_CHARS: [char; 7] = ['@', '-', '_', '=', '?', '&', '%'];

const LEXICAL_NAMES: [&str; 8] = [
    "url_length",
    "num_dots",
    "has_ip",
    "has_https",
    "has_at",
    "has_dash",
    "num_suspicious_words",
    "domain_length",
];

const COMPACT_NAMES: [&str; 5] = [
    "url_length",
    "num_dots",
    "has_digit",
    "has_https",
    "special_char_count",
];

static DOTTED_QUAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}(\.\d{1,3}){3}").expect("valid dotted-quad regex"));
static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid digit regex"));

/// A URL cell as read from the dataset or passed by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlInput {
    Valid(String),
    /// Missing or unusable value.
    Invalid,
}

impl From<&str> for UrlInput {
    fn from(url: &str) -> Self {
        UrlInput::Valid(url.to_string())
    }
}

impl From<String> for UrlInput {
    fn from(url: String) -> Self {
        UrlInput::Valid(url)
    }
}

impl<T: Into<UrlInput>> From<Option<T>> for UrlInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(UrlInput::Invalid, Into::into)
    }
}

/// Which feature layout a vector (and a model trained on it) uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSet {
    #[default]
    Lexical,
    Compact,
}

impl FeatureSet {
    pub fn names(self) -> &'static [&'static str] {
        match self {
            FeatureSet::Lexical => &LEXICAL_NAMES,
            FeatureSet::Compact => &COMPACT_NAMES,
        }
    }

    pub fn len(self) -> usize {
        self.names().len()
    }

    pub fn extract(self, url: &UrlInput) -> Vec<f64> {
        match (self, url) {
            (_, UrlInput::Invalid) => vec![0.0; self.len()],
            (FeatureSet::Lexical, UrlInput::Valid(url)) => lexical_features(url),
            (FeatureSet::Compact, UrlInput::Valid(url)) => compact_features(url),
        }
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSet::Lexical => f.write_str("lexical"),
            FeatureSet::Compact => f.write_str("compact"),
        }
    }
}

impl FromStr for FeatureSet {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexical" => Ok(FeatureSet::Lexical),
            "compact" => Ok(FeatureSet::Compact),
            _ => Err(format!("Unknown feature set: {s}. Use 'lexical' or 'compact'.")),
        }
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// The 8-value training layout.
pub fn lexical_features(url: &str) -> Vec<f64> {
    let lowered = url.to_lowercase();
    let suspicious = SUSPICIOUS_WORDS
        .iter()
        .filter(|word| lowered.contains(*word))
        .count();

    vec![
        url.chars().count() as f64,
        url.matches('.').count() as f64,
        flag(DOTTED_QUAD.is_match(url)),
        flag(url.starts_with("https")),
        flag(url.contains('@')),
        flag(url.contains('-')),
        suspicious as f64,
        registrable_label(url).map_or(0, |label| label.chars().count()) as f64,
    ]
}

/// The 5-value layout.
pub fn compact_features(url: &str) -> Vec<f64> {
    vec![
        url.chars().count() as f64,
        url.matches('.').count() as f64,
        flag(DIGIT.is_match(url)),
        flag(url.contains("https")),
        url.chars().filter(|c| SPECIAL_CHARS.contains(c)).count() as f64,
    ]
}

fn parse_host(url: &str) -> Option<Host<String>> {
    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("http://{url}")).ok())?;
    parsed.host().map(|host| host.to_owned())
}

/// The registrable domain label of `url`, i.e. the label directly below its
/// ICANN public suffix (`example` for `https://www.example.co.uk/`).
///
/// Private-section suffixes such as `github.io` are ignored, so
/// `user.github.io` yields `github`. A host without a known suffix yields its
/// last label (`localhost`, `notatld`), an IP host yields the address, and a
/// host that is itself a suffix yields `None`.
pub fn registrable_label(url: &str) -> Option<String> {
    match parse_host(url)? {
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
        Host::Domain(domain) => domain_label(&domain),
    }
}

fn is_icann_suffix(candidate: &str) -> bool {
    psl::suffix(candidate.as_bytes()).is_some_and(|suffix| {
        suffix.is_known()
            && matches!(suffix.typ(), Some(Type::Icann))
            && suffix.as_bytes() == candidate.as_bytes()
    })
}

fn domain_label(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        return None;
    }
    if host.parse::<IpAddr>().is_ok() {
        return Some(host);
    }

    let labels: Vec<&str> = host.split('.').collect();
    // Longest ICANN suffix wins.
    for start in 0..labels.len() {
        if is_icann_suffix(&labels[start..].join(".")) {
            return start.checked_sub(1).map(|i| labels[i].to_string());
        }
    }
    labels.last().map(|label| label.to_string())
}
