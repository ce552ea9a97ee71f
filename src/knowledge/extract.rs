//! Pattern-based entity recognition.
//!
//! Each [`EntityType`] owns one recognizer: a regex plus a validation predicate.
//! [`extract`] runs the recognizer table (optionally filtered by type) and
//! deduplicates on `(type, normalized value)`. Overlapping matches from different
//! recognizers are all kept; resolving ambiguity is left to the caller.
//!
//! All patterns are compiled by the `regex` crate, which guarantees linear-time
//! matching, so arbitrarily long input terminates in bounded time.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

// ── Patterns ──────────────────────────────────────────────────────────────────

static RE_IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());

static RE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:https?|ftp)://[^\s<>"'()\[\]]+"#).unwrap());

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

static RE_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,24}\b").unwrap()
});

static RE_HASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Fa-f0-9]{32,128}\b").unwrap());

static RE_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\b[\w-]+(?:\.[\w-]+)*\.(?:{})\b", FILE_EXTENSIONS.join("|"));
    Regex::new(&pattern).unwrap()
});

static RE_PORT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bports?\s*(?:number\s*)?[:#]?\s*(\d{1,5})\b").unwrap());

static RE_PORT_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:\d{1,3}(?:\.\d{1,3}){3}|localhost|[a-z0-9-]+(?:\.[a-z0-9-]+)+):(\d{1,5})\b",
    )
    .unwrap()
});

static RE_CVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,7}\b").unwrap());

static RE_TECHNIQUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bT\d{4}(?:\.\d{3})?\b").unwrap());

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w][\w.-]*[\w]").unwrap());

/// Extensions that make a dotted token a filename rather than a host.
const FILE_EXTENSIONS: &[&str] = &[
    "exe", "dll", "sys", "bat", "cmd", "ps1", "vbs", "sh", "py", "pl", "rb", "js", "jar",
    "txt", "log", "conf", "cfg", "ini", "yml", "yaml", "json", "xml", "csv", "md", "pdf",
    "doc", "docx", "xls", "xlsx", "zip", "tar", "gz", "tgz", "7z", "rar", "iso", "img",
    "bin", "elf", "so", "dmp", "pcap", "pcapng", "html", "php", "aspx", "lnk", "msi",
];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "about", "into", "onto", "that", "this", "these",
    "those", "what", "which", "who", "whom", "whose", "when", "where", "why", "how", "are",
    "was", "were", "been", "being", "have", "has", "had", "does", "did", "doing", "can",
    "could", "should", "would", "will", "shall", "may", "might", "must", "not", "but", "any",
    "all", "some", "there", "their", "them", "they", "you", "your", "our", "his", "her",
    "its", "use", "used", "using", "tell", "show", "give", "explain", "describe", "please",
    "know", "get", "list", "find", "via", "than", "then", "also", "just", "like", "on",
];

// ── Types ─────────────────────────────────────────────────────────────────────

/// The fixed set of recognizable entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    IpAddress,
    Url,
    Domain,
    Email,
    Hash,
    Filename,
    Port,
    Cve,
    Technique,
}

impl EntityType {
    pub const ALL: [EntityType; 9] = [
        Self::IpAddress,
        Self::Url,
        Self::Domain,
        Self::Email,
        Self::Hash,
        Self::Filename,
        Self::Port,
        Self::Cve,
        Self::Technique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IpAddress => "ip_address",
            Self::Url => "url",
            Self::Domain => "domain",
            Self::Email => "email",
            Self::Hash => "hash",
            Self::Filename => "filename",
            Self::Port => "port",
            Self::Cve => "cve",
            Self::Technique => "technique",
        }
    }

    fn recognizer(&self) -> Recognizer {
        match self {
            Self::IpAddress => recognize_ipv4,
            Self::Url => recognize_url,
            Self::Domain => recognize_domain,
            Self::Email => recognize_email,
            Self::Hash => recognize_hash,
            Self::Filename => recognize_filename,
            Self::Port => recognize_port,
            Self::Cve => recognize_cve,
            Self::Technique => recognize_technique,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

/// Byte offsets `[start, end)` of a match in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A typed entity found in free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Normalized matched text.
    pub value: String,
    /// Pattern specificity in `[0.0, 1.0]`.
    pub confidence: f64,
    pub span: Span,
}

/// Raw recognizer output before deduplication.
struct Candidate {
    value: String,
    confidence: f64,
    span: Span,
}

type Recognizer = fn(&str) -> Vec<Candidate>;

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse entity type names, logging and skipping the ones that are not known.
pub fn known_types<S: AsRef<str>>(names: &[S]) -> BTreeSet<EntityType> {
    names
        .iter()
        .filter_map(|name| match name.as_ref().trim().parse() {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unknown entity type");
                None
            }
        })
        .collect()
}

/// Extract entities from `text`.
///
/// When `types` is given, only those recognizers run. Results are ordered by
/// span start, then by type.
pub fn extract(text: &str, types: Option<&BTreeSet<EntityType>>) -> Vec<Entity> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut seen: HashSet<(EntityType, String)> = HashSet::new();
    let mut entities = Vec::new();

    for entity_type in EntityType::ALL {
        if types.is_some_and(|wanted| !wanted.contains(&entity_type)) {
            continue;
        }
        for candidate in (entity_type.recognizer())(text) {
            if seen.insert((entity_type, candidate.value.clone())) {
                entities.push(Entity {
                    entity_type,
                    value: candidate.value,
                    confidence: candidate.confidence,
                    span: candidate.span,
                });
            }
        }
    }

    entities.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(a.entity_type.cmp(&b.entity_type))
    });
    entities
}

/// Lower-cased, de-duplicated content words of `text` (length ≥ 3, stopwords
/// removed), in order of first appearance.
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    RE_WORD
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

// ── Recognizers ───────────────────────────────────────────────────────────────

fn span_of(m: &regex::Match<'_>) -> Span {
    Span {
        start: m.start(),
        end: m.end(),
    }
}

fn byte_before(text: &str, idx: usize) -> Option<u8> {
    idx.checked_sub(1).map(|i| text.as_bytes()[i])
}

fn byte_at(text: &str, idx: usize) -> Option<u8> {
    text.as_bytes().get(idx).copied()
}

fn recognize_ipv4(text: &str) -> Vec<Candidate> {
    RE_IPV4
        .find_iter(text)
        .filter(|m| m.as_str().split('.').all(|octet| octet.parse::<u8>().is_ok()))
        // Part of a longer dotted number such as a version string.
        .filter(|m| byte_before(text, m.start()) != Some(b'.'))
        .filter(|m| {
            !(byte_at(text, m.end()) == Some(b'.')
                && byte_at(text, m.end() + 1).is_some_and(|b| b.is_ascii_digit()))
        })
        .map(|m| Candidate {
            value: m.as_str().to_string(),
            confidence: 0.95,
            span: span_of(&m),
        })
        .collect()
}

fn recognize_url(text: &str) -> Vec<Candidate> {
    RE_URL
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
            let (scheme, rest) = raw.split_once("://")?;
            if rest.is_empty() {
                return None;
            }
            let host_end = rest.find('/').unwrap_or(rest.len());
            let value = format!(
                "{}://{}{}",
                scheme.to_lowercase(),
                rest[..host_end].to_lowercase(),
                &rest[host_end..]
            );
            Some(Candidate {
                value,
                confidence: 0.9,
                span: Span {
                    start: m.start(),
                    end: m.start() + raw.len(),
                },
            })
        })
        .collect()
}

fn recognize_email(text: &str) -> Vec<Candidate> {
    RE_EMAIL
        .find_iter(text)
        .map(|m| Candidate {
            value: m.as_str().to_lowercase(),
            confidence: 0.95,
            span: span_of(&m),
        })
        .collect()
}

fn recognize_domain(text: &str) -> Vec<Candidate> {
    RE_DOMAIN
        .find_iter(text)
        // Host or local part of an email address.
        .filter(|m| byte_before(text, m.start()) != Some(b'@') && byte_at(text, m.end()) != Some(b'@'))
        .filter(|m| byte_before(text, m.start()) != Some(b'.'))
        .filter(|m| {
            let tld = m.as_str().rsplit('.').next().unwrap_or_default().to_lowercase();
            !FILE_EXTENSIONS.contains(&tld.as_str())
        })
        .map(|m| Candidate {
            value: m.as_str().to_lowercase(),
            confidence: 0.7,
            span: span_of(&m),
        })
        .collect()
}

fn recognize_hash(text: &str) -> Vec<Candidate> {
    RE_HASH
        .find_iter(text)
        .filter_map(|m| {
            let confidence = match m.as_str().len() {
                32 => 0.8,
                40 => 0.85,
                64 | 128 => 0.9,
                _ => return None,
            };
            Some(Candidate {
                value: m.as_str().to_lowercase(),
                confidence,
                span: span_of(&m),
            })
        })
        .collect()
}

fn recognize_filename(text: &str) -> Vec<Candidate> {
    RE_FILENAME
        .find_iter(text)
        .filter(|m| byte_before(text, m.start()) != Some(b'@'))
        .map(|m| Candidate {
            value: m.as_str().to_string(),
            confidence: 0.6,
            span: span_of(&m),
        })
        .collect()
}

fn recognize_port(text: &str) -> Vec<Candidate> {
    let keyword = RE_PORT_KEYWORD.captures_iter(text).map(|c| (c, 0.85));
    let host = RE_PORT_HOST.captures_iter(text).map(|c| (c, 0.7));

    keyword
        .chain(host)
        .filter_map(|(caps, confidence)| {
            let digits = caps.get(1)?;
            let port: u16 = digits.as_str().parse().ok()?;
            if port == 0 {
                return None;
            }
            Some(Candidate {
                value: port.to_string(),
                confidence,
                span: span_of(&digits),
            })
        })
        .collect()
}

fn recognize_cve(text: &str) -> Vec<Candidate> {
    RE_CVE
        .find_iter(text)
        .map(|m| Candidate {
            value: m.as_str().to_uppercase(),
            confidence: 0.98,
            span: span_of(&m),
        })
        .collect()
}

fn recognize_technique(text: &str) -> Vec<Candidate> {
    RE_TECHNIQUE
        .find_iter(text)
        .map(|m| Candidate {
            value: m.as_str().to_string(),
            confidence: 0.9,
            span: span_of(&m),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(entities: &[Entity], t: EntityType) -> Vec<&str> {
        entities
            .iter()
            .filter(|e| e.entity_type == t)
            .map(|e| e.value.as_str())
            .collect()
    }

    #[test]
    fn contact_sentence_yields_email_ip_and_port() {
        let entities = extract(
            "Contact admin@example.com about 192.168.1.100 on port 443",
            None,
        );
        assert_eq!(entities.len(), 3, "got {entities:?}");
        assert_eq!(values(&entities, EntityType::Email), vec!["admin@example.com"]);
        assert_eq!(values(&entities, EntityType::IpAddress), vec!["192.168.1.100"]);
        assert_eq!(values(&entities, EntityType::Port), vec!["443"]);
    }

    #[test]
    fn ipv4_octets_are_validated() {
        let entities = extract("hosts 10.0.0.256 and 10.0.0.255", None);
        assert_eq!(values(&entities, EntityType::IpAddress), vec!["10.0.0.255"]);
    }

    #[test]
    fn dotted_version_is_not_an_ip() {
        let entities = extract("upgrade to 1.2.3.4.5 now", None);
        assert!(values(&entities, EntityType::IpAddress).is_empty());
    }

    #[test]
    fn port_range_is_validated() {
        let entities = extract("port 70000 and port 0 and port 22", None);
        assert_eq!(values(&entities, EntityType::Port), vec!["22"]);
    }

    #[test]
    fn host_port_form_is_recognized() {
        let entities = extract("listener at 10.1.1.5:8443", None);
        assert_eq!(values(&entities, EntityType::Port), vec!["8443"]);
        assert_eq!(values(&entities, EntityType::IpAddress), vec!["10.1.1.5"]);
    }

    #[test]
    fn clock_times_are_not_ports() {
        let entities = extract("meeting at 10:30", Some(&BTreeSet::from([EntityType::Port])));
        assert!(entities.is_empty());
    }

    #[test]
    fn url_host_is_lower_cased_and_trailing_punctuation_dropped() {
        let entities = extract("see https://Evil.EXAMPLE.org/Payload.", None);
        assert_eq!(
            values(&entities, EntityType::Url),
            vec!["https://evil.example.org/Payload"]
        );
        // the host is also surfaced as a domain
        assert_eq!(values(&entities, EntityType::Domain), vec!["evil.example.org"]);
    }

    #[test]
    fn hash_lengths() {
        let md5 = "d41d8cd98f00b204e9800998ecf8427e";
        let sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let entities = extract(&format!("{md5} {sha256} deadbeef"), None);
        assert_eq!(values(&entities, EntityType::Hash), vec![md5, sha256]);
        let sha = entities.iter().find(|e| e.value == sha256).unwrap();
        assert!(sha.confidence > 0.85);
    }

    #[test]
    fn filename_is_not_a_domain() {
        let entities = extract("dropped payload.exe into temp", None);
        assert_eq!(values(&entities, EntityType::Filename), vec!["payload.exe"]);
        assert!(values(&entities, EntityType::Domain).is_empty());
    }

    #[test]
    fn cve_and_technique_ids() {
        let entities = extract("cve-2021-44228 is exploited via T1190 and T1003.001", None);
        assert_eq!(values(&entities, EntityType::Cve), vec!["CVE-2021-44228"]);
        assert_eq!(values(&entities, EntityType::Technique), vec!["T1190", "T1003.001"]);
    }

    #[test]
    fn type_filter_limits_recognizers() {
        let only_ip = BTreeSet::from([EntityType::IpAddress]);
        let entities = extract("admin@example.com 8.8.8.8", Some(&only_ip));
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, EntityType::IpAddress);
    }

    #[test]
    fn duplicates_collapse_on_normalized_value() {
        let entities = extract("Example.com and example.COM", None);
        assert_eq!(values(&entities, EntityType::Domain), vec!["example.com"]);
        assert_eq!(entities[0].span, Span { start: 0, end: 11 });
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(extract("", None).is_empty());
        assert!(extract("   \n", None).is_empty());
    }

    #[test]
    fn long_input_terminates() {
        let text = "a.".repeat(20_000) + &"9".repeat(20_000);
        let entities = extract(&text, None);
        assert!(entities.len() < 10);
    }

    #[test]
    fn keywords_drop_stopwords_and_short_tokens() {
        assert_eq!(
            keywords("How does Mimikatz use the LSASS process? mimikatz"),
            vec!["mimikatz", "lsass", "process"]
        );
        assert_eq!(keywords("tell me about man_page_nmap"), vec!["man_page_nmap"]);
        assert_eq!(
            keywords("contact the port scanner"),
            vec!["contact", "port", "scanner"]
        );
    }

    #[test]
    fn entity_type_round_trips_through_str() {
        for t in EntityType::ALL {
            assert_eq!(t.as_str().parse::<EntityType>().unwrap(), t);
        }
        assert!("phone".parse::<EntityType>().is_err());
        assert_eq!(
            known_types(&["ip_address", " phone ", "cve"]),
            BTreeSet::from([EntityType::IpAddress, EntityType::Cve])
        );
    }
}
