//! Core knowledge-graph type definitions.
//!
//! Defines [`Node`] and [`Edge`] (the stored graph), [`PropertyValue`] (scalar
//! property values), and [`Triplet`] (the ingestion shape every knowledge source
//! produces).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Property map attached to nodes and edges. Keys are kept sorted so formatting
/// and snapshots are reproducible.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    /// The value as text, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Derive a stable node identifier from free text.
///
/// Lower-cases, trims, and collapses internal whitespace runs to a single space,
/// so `"  Mimikatz\tTool "` and `"mimikatz tool"` map to the same node.
pub fn normalize_id(seed: &str) -> String {
    seed.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Normalized identifier, see [`normalize_id`].
    pub id: String,
    /// Display name: the text the node was first created from.
    pub name: String,
    /// Type labels such as `"technique"` or `"tool"`.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    /// The label used for grouping: the first label in sorted order, or
    /// `"entity"` for unlabeled nodes.
    pub fn primary_label(&self) -> &str {
        self.labels
            .iter()
            .next()
            .map(String::as_str)
            .unwrap_or("entity")
    }

    /// Value of the `source` property, if set.
    pub fn source(&self) -> Option<&str> {
        self.properties.get("source").and_then(PropertyValue::as_str)
    }
}

/// Identity of an edge: `(from_id, to_id, relationship)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from_id: String,
    pub to_id: String,
    pub relationship: String,
}

/// A directed, labeled edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    /// Relationship type, e.g. `"uses"` or `"mitigates"`.
    pub relationship: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Edge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            from_id: self.from_id.clone(),
            to_id: self.to_id.clone(),
            relationship: self.relationship.clone(),
        }
    }

    /// Value of the `source` property, if set.
    pub fn source(&self) -> Option<&str> {
        self.properties.get("source").and_then(PropertyValue::as_str)
    }
}

/// A `(subject, relationship, object)` fact, the unit of ingestion.
///
/// `properties` land on the edge. Optional labels and properties for the
/// endpoint nodes let a source type and describe what it mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub subject: String,
    pub relationship: String,
    pub object: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub subject_labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub object_labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subject_properties: Properties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub object_properties: Properties,
}

impl Triplet {
    pub fn new(
        subject: impl Into<String>,
        relationship: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relationship: relationship.into(),
            object: object.into(),
            properties: Properties::new(),
            subject_labels: BTreeSet::new(),
            object_labels: BTreeSet::new(),
            subject_properties: Properties::new(),
            object_properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_subject_label(mut self, label: impl Into<String>) -> Self {
        self.subject_labels.insert(label.into());
        self
    }

    pub fn with_object_label(mut self, label: impl Into<String>) -> Self {
        self.object_labels.insert(label.into());
        self
    }

    pub fn with_subject_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.subject_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_object_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.object_properties.insert(key.into(), value.into());
        self
    }

    /// A triplet needs a non-blank subject and object to be applied.
    pub fn is_well_formed(&self) -> bool {
        !self.subject.trim().is_empty() && !self.object.trim().is_empty()
    }
}
