//! Knowledge sources: producers of triplets.
//!
//! [`KnowledgeSource`] is a closed set of sources sharing one capability,
//! [`KnowledgeSource::triplets`]. The engine only ever consumes the triplets.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::types::{PropertyValue, Triplet};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid triplet file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where knowledge comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnowledgeSource {
    /// A JSON array of triplets (the `export`/`import` format).
    Triplets(PathBuf),
    /// A Markdown file: headings name subjects, `- relationship: object`
    /// bullets under them name facts.
    Markdown(PathBuf),
    /// The built-in cybersecurity framework sample.
    Framework,
}

/// Source entry as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Triplets,
    Markdown,
}

impl SourceSpec {
    pub fn to_source(&self) -> KnowledgeSource {
        let path = crate::config::expand_tilde(&self.path);
        match self.kind {
            SourceKind::Triplets => KnowledgeSource::Triplets(path),
            SourceKind::Markdown => KnowledgeSource::Markdown(path),
        }
    }
}

impl KnowledgeSource {
    /// Pick a source for a file by its extension: `.md`/`.markdown` is Markdown,
    /// anything else is a triplet file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.extension().and_then(|e| e.to_str()) {
            Some("md" | "markdown") => Self::Markdown(path),
            _ => Self::Triplets(path),
        }
    }

    /// Short human-readable name, used in logs.
    pub fn name(&self) -> String {
        match self {
            Self::Triplets(path) => format!("triplets:{}", path.display()),
            Self::Markdown(path) => format!("markdown:{}", path.display()),
            Self::Framework => "framework:mitre_attack".to_string(),
        }
    }

    /// Produce every triplet this source knows.
    pub fn triplets(&self) -> Result<Vec<Triplet>, SourceError> {
        match self {
            Self::Triplets(path) => {
                let json = read(path)?;
                serde_json::from_str(&json).map_err(|source| SourceError::Parse {
                    path: path.clone(),
                    source,
                })
            }
            Self::Markdown(path) => {
                let text = read(path)?;
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("markdown");
                Ok(parse_markdown(&text, stem))
            }
            Self::Framework => Ok(framework_triplets()),
        }
    }
}

fn read(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Markdown ──────────────────────────────────────────────────────────────────

/// Parse headings and bullets into triplets.
///
/// ```text
/// # Nmap (tool)
/// - documented_in: man_page_nmap (document)
/// - implements: T1046
/// ```
///
/// A trailing `(label)` types the node. Bullets without a colon relate to the
/// heading as `related_to`. Every triplet gets `source = <source_name>`.
pub fn parse_markdown(text: &str, source_name: &str) -> Vec<Triplet> {
    let mut triplets = Vec::new();
    let mut subject: Option<(String, Option<String>)> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(heading) = line.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim();
            subject = (!heading.is_empty()).then(|| split_label(heading));
            continue;
        }

        let Some(bullet) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) else {
            continue;
        };
        let Some((name, label)) = subject.as_ref() else {
            continue;
        };

        let (relationship, object) = match bullet.split_once(':') {
            Some((rel, obj)) => (rel.trim().to_lowercase().replace(' ', "_"), obj.trim()),
            None => ("related_to".to_string(), bullet.trim()),
        };
        if object.is_empty() {
            continue;
        }
        let (object, object_label) = split_label(object);

        let mut triplet = Triplet::new(name.clone(), relationship, object)
            .with_property("source", PropertyValue::from(source_name));
        if let Some(label) = label {
            triplet = triplet.with_subject_label(label.clone());
        }
        if let Some(label) = object_label {
            triplet = triplet.with_object_label(label);
        }
        triplets.push(triplet);
    }

    triplets
}

/// `"Nmap (tool)"` → `("Nmap", Some("tool"))`.
fn split_label(text: &str) -> (String, Option<String>) {
    if let Some(open) = text.rfind(" (") {
        if let Some(inner) = text[open + 2..].strip_suffix(')') {
            if !inner.is_empty() && !inner.contains(['(', ')']) {
                return (text[..open].trim().to_string(), Some(inner.trim().to_lowercase()));
            }
        }
    }
    (text.to_string(), None)
}

// ── Built-in framework ────────────────────────────────────────────────────────

const FRAMEWORK_SOURCE: &str = "mitre_attack";

const TACTICS: &[(&str, &str)] = &[
    ("TA0001", "Initial Access"),
    ("TA0002", "Execution"),
    ("TA0006", "Credential Access"),
    ("TA0007", "Discovery"),
    ("TA0008", "Lateral Movement"),
];

/// `(id, title, tactic)`
const TECHNIQUES: &[(&str, &str, &str)] = &[
    ("T1003", "OS Credential Dumping", "TA0006"),
    ("T1110", "Brute Force", "TA0006"),
    ("T1059", "Command and Scripting Interpreter", "TA0002"),
    ("T1190", "Exploit Public-Facing Application", "TA0001"),
    ("T1566", "Phishing", "TA0001"),
    ("T1046", "Network Service Discovery", "TA0007"),
    ("T1021", "Remote Services", "TA0008"),
];

/// `(id, title, parent)`
const SUB_TECHNIQUES: &[(&str, &str, &str)] = &[
    ("T1003.001", "LSASS Memory", "T1003"),
    ("T1059.001", "PowerShell", "T1059"),
    ("T1566.001", "Spearphishing Attachment", "T1566"),
    ("T1021.004", "SSH", "T1021"),
];

/// `(tool, technique)`
const TOOLS: &[(&str, &str)] = &[
    ("Mimikatz", "T1003.001"),
    ("Nmap", "T1046"),
    ("Hydra", "T1110"),
    ("Metasploit", "T1190"),
    ("PsExec", "T1021"),
];

/// `(id, title, technique)`
const MITIGATIONS: &[(&str, &str, &str)] = &[
    ("M1043", "Credential Access Protection", "T1003"),
    ("M1032", "Multi-factor Authentication", "T1110"),
    ("M1048", "Application Isolation and Sandboxing", "T1190"),
    ("M1049", "Antivirus/Antimalware", "T1566.001"),
    ("M1042", "Disable or Remove Feature or Program", "T1059.001"),
];

/// `(group, relationship, target)`
const GROUPS: &[(&str, &str, &str)] = &[
    ("APT29", "uses", "Mimikatz"),
    ("APT29", "uses", "T1059.001"),
    ("APT29", "uses", "T1566.001"),
    ("APT28", "uses", "T1110"),
    ("APT28", "uses", "T1190"),
];

fn tactic_title(id: &str) -> &str {
    TACTICS
        .iter()
        .find(|(t, _)| *t == id)
        .map(|(_, title)| *title)
        .unwrap_or(id)
}

fn framework_triplets() -> Vec<Triplet> {
    let fact = |s: &str, rel: &str, o: &str| {
        Triplet::new(s, rel, o).with_property("source", PropertyValue::from(FRAMEWORK_SOURCE))
    };
    let mut triplets = Vec::new();
    for &(id, title, tactic) in TECHNIQUES {
        triplets.push(
            fact(id, "belongs_to", tactic)
                .with_subject_label("technique")
                .with_subject_property("title", title)
                .with_object_label("tactic")
                .with_object_property("title", tactic_title(tactic)),
        );
    }
    for &(id, title, parent) in SUB_TECHNIQUES {
        triplets.push(
            fact(id, "sub_technique_of", parent)
                .with_subject_label("technique")
                .with_subject_property("title", title)
                .with_object_label("technique"),
        );
    }
    for &(tool, technique) in TOOLS {
        triplets.push(
            fact(tool, "implements", technique)
                .with_subject_label("tool")
                .with_object_label("technique"),
        );
    }
    for &(id, title, technique) in MITIGATIONS {
        triplets.push(
            fact(id, "mitigates", technique)
                .with_subject_label("mitigation")
                .with_subject_property("title", title)
                .with_object_label("technique"),
        );
    }
    for &(group, relationship, target) in GROUPS {
        triplets.push(fact(group, relationship, target).with_subject_label("group"));
    }
    triplets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_headings_and_bullets() {
        let text = "\
# Nmap (tool)
Network scanner.
- documented_in: man_page_nmap (document)
- Implements: T1046
* zenmap

## Hydra
- implements:
";
        let triplets = parse_markdown(text, "tools");
        assert_eq!(triplets.len(), 3);

        assert_eq!(triplets[0].subject, "Nmap");
        assert_eq!(triplets[0].relationship, "documented_in");
        assert_eq!(triplets[0].object, "man_page_nmap");
        assert!(triplets[0].subject_labels.contains("tool"));
        assert!(triplets[0].object_labels.contains("document"));
        assert_eq!(triplets[0].properties["source"], PropertyValue::from("tools"));

        assert_eq!(triplets[1].relationship, "implements");
        assert_eq!(triplets[2].relationship, "related_to");
        assert_eq!(triplets[2].object, "zenmap");
    }

    #[test]
    fn bullets_before_any_heading_are_ignored() {
        assert!(parse_markdown("- uses: x\n", "notes").is_empty());
    }

    #[test]
    fn label_suffix_parsing() {
        assert_eq!(split_label("Nmap (Tool)"), ("Nmap".into(), Some("tool".into())));
        assert_eq!(split_label("plain"), ("plain".into(), None));
        assert_eq!(split_label("f(x)"), ("f(x)".into(), None));
    }

    #[test]
    fn framework_is_well_formed_and_attributed() {
        let triplets = KnowledgeSource::Framework.triplets().unwrap();
        assert!(triplets.len() > 20);
        assert!(triplets.iter().all(Triplet::is_well_formed));
        assert!(triplets
            .iter()
            .all(|t| t.properties["source"] == PropertyValue::from(FRAMEWORK_SOURCE)));
    }

    #[test]
    fn triplet_file_errors_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = KnowledgeSource::Triplets(dir.path().join("missing.json"));
        assert!(matches!(missing.triplets(), Err(SourceError::Io { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(
            KnowledgeSource::Triplets(bad).triplets(),
            Err(SourceError::Parse { .. })
        ));
    }

    #[test]
    fn source_kind_from_extension() {
        assert!(matches!(KnowledgeSource::from_path("a/notes.md"), KnowledgeSource::Markdown(_)));
        assert!(matches!(KnowledgeSource::from_path("a/kb.json"), KnowledgeSource::Triplets(_)));
    }
}
