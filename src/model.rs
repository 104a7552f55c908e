//! Records exchanged with the OCL repository API.
//!
//! Every record here has an explicit serde schema so that a payload missing a required
//! field is rejected at the fetch boundary instead of leaking empty values into the
//! traversal.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter};

/// Id of the mutable head version of a source.
pub const HEAD_VERSION_ID: &str = "HEAD";

/// Identifier of a concept, unique within one source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(String);

impl ConceptId {
    pub fn new(id: impl Into<String>) -> Self {
        ConceptId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConceptId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConceptId {
    fn from(id: u64) -> Self {
        ConceptId(id.to_string())
    }
}

impl From<&str> for ConceptId {
    fn from(id: &str) -> Self {
        ConceptId(id.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(id: String) -> Self {
        ConceptId(id)
    }
}

/// An opaque expression the collection service uses to point at a concept version or a
/// mapping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    pub fn new(expression: impl Into<String>) -> Self {
        Reference(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Reference {
    fn from(expression: &str) -> Self {
        Reference(expression.to_string())
    }
}

impl From<String> for Reference {
    fn from(expression: String) -> Self {
        Reference(expression)
    }
}

/// One entry of `GET {collection}references`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReferenceRecord {
    pub expression: Reference,
}

/// A directed relation from the owning concept to a target concept, possibly in another
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub url: String,
    #[serde(default)]
    pub map_type: String,
    #[serde(default)]
    pub from_concept_url: Option<String>,
    #[serde(default)]
    pub to_source_url: Option<String>,
    #[serde(default)]
    pub to_concept_code: Option<String>,
    #[serde(default)]
    pub to_concept_url: Option<String>,
}

impl Mapping {
    /// The target concept id when this mapping points into `source_path`.
    pub fn same_source_target(&self, source_path: &str) -> Option<ConceptId> {
        match (&self.to_source_url, &self.to_concept_code) {
            (Some(to_source), Some(code)) if to_source == source_path => {
                Some(ConceptId::new(code.clone()))
            }
            _ => None,
        }
    }

    /// Where this mapping points, preferring the concrete concept url.
    pub fn target(&self) -> String {
        match &self.to_concept_url {
            Some(url) => url.clone(),
            None => format!(
                "{}{}",
                self.to_source_url.as_deref().unwrap_or_default(),
                self.to_concept_code.as_deref().unwrap_or_default()
            ),
        }
    }
}

impl Display for Mapping {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.from_concept_url.as_deref().unwrap_or("?"),
            self.map_type,
            self.target()
        )
    }
}

/// A concept as returned by `GET {version}concepts/{id}?includeMappings=true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    #[serde(default)]
    pub display_name: String,
    pub version_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mappings: Vec<Mapping>,
}

impl Concept {
    /// Ids of concepts in `source_path` this concept maps to, in mapping order.
    pub fn related_ids<'a>(&'a self, source_path: &'a str) -> impl Iterator<Item = ConceptId> + 'a {
        self.mappings
            .iter()
            .filter_map(move |m| m.same_source_target(source_path))
    }
}

/// One published version of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceVersion {
    pub id: String,
    pub version_url: String,
    #[serde(deserialize_with = "ocl_timestamp")]
    pub created_on: DateTime<Utc>,
}

impl SourceVersion {
    pub fn is_head(&self) -> bool {
        self.id == HEAD_VERSION_ID
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses either an RFC 3339 timestamp or the zone-less ISO-8601 form the repository
/// emits (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn ocl_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid created_on timestamp '{raw}'")))
}
