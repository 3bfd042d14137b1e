use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Literal – a plain scalar constraint value
// ---------------------------------------------------------------------------

/// A scalar taken verbatim from a filter file (or a template).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Bool(bool),
}

impl Eq for Literal {}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{s}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Unsigned(u) => write!(f, "{u}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Literal {
    /// Compare against an entity value parsed from a file name.
    ///
    /// `integer` marks entities such as `run` whose labels are numbers, so
    /// that `1`, `"1"` and `"01"` all match `run-01`.
    pub fn matches_entity(&self, raw: &str, integer: bool) -> bool {
        match self {
            Literal::String(s) => {
                s == raw
                    || (integer
                        && matches!(
                            (s.parse::<i64>(), raw.parse::<i64>()),
                            (Ok(a), Ok(b)) if a == b
                        ))
            }
            Literal::Integer(i) => raw.parse::<i64>().is_ok_and(|v| v == *i),
            Literal::Unsigned(u) => raw.parse::<u64>().is_ok_and(|v| v == *u),
            Literal::Float(f) => raw.parse::<f64>().is_ok_and(|v| v == *f),
            Literal::Bool(b) => raw.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
        }
    }

    /// Compare against a sidecar metadata value.
    pub fn matches_json(&self, value: &JsonValue) -> bool {
        match (self, value) {
            (Literal::String(s), JsonValue::String(v)) => s == v,
            (Literal::Bool(b), JsonValue::Bool(v)) => b == v,
            (Literal::Integer(i), JsonValue::Number(n)) => {
                n.as_i64() == Some(*i) || n.as_f64() == Some(*i as f64)
            }
            (Literal::Unsigned(u), JsonValue::Number(n)) => n.as_u64() == Some(*u),
            (Literal::Float(f), JsonValue::Number(n)) => n.as_f64() == Some(*f),
            _ => false,
        }
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Literal::String(s) => serializer.serialize_str(s),
            Literal::Integer(i) => serializer.serialize_i64(*i),
            Literal::Unsigned(u) => serializer.serialize_u64(*u),
            Literal::Float(f) => serializer.serialize_f64(*f),
            Literal::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

// ---------------------------------------------------------------------------
// EntityValue – one constraint inside a bucket
// ---------------------------------------------------------------------------

/// JSON spelling of [`EntityValue::Any`].
pub const ANY_SENTINEL: &str = "*";

/// Wire form of [`EntityValue::Optional`]; the other markers have native
/// JSON spellings.
pub const OPTIONAL_MARKER: &str = "<Query.OPTIONAL: 3>";

/// A query constraint on a single entity.
///
/// JSON mapping:
/// * `null`                                      → [`EntityValue::Absent`]
/// * `"*"`                                       → [`EntityValue::Any`]
/// * `"<Query.NAME: N>"` or `"Query.NAME"`       → the named marker
/// * string / number / bool                      → [`EntityValue::Literal`]
/// * array of scalars                            → [`EntityValue::OneOf`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValue {
    /// The entity must not be present.
    Absent,
    /// The entity must be present, with any value.
    Any,
    /// No constraint at all.
    Optional,
    Literal(Literal),
    OneOf(Vec<Literal>),
}

impl EntityValue {
    /// Whether a file carrying `observed` (or nothing) for this entity passes.
    pub fn accepts(&self, observed: Option<Observed<'_>>) -> bool {
        match self {
            EntityValue::Absent => observed.is_none(),
            EntityValue::Any => observed.is_some(),
            EntityValue::Optional => true,
            EntityValue::Literal(lit) => observed.is_some_and(|o| o.matches(lit)),
            EntityValue::OneOf(lits) => {
                observed.is_some_and(|o| lits.iter().any(|lit| o.matches(lit)))
            }
        }
    }
}

impl From<&str> for EntityValue {
    fn from(s: &str) -> Self {
        EntityValue::Literal(Literal::String(s.to_string()))
    }
}

impl From<i64> for EntityValue {
    fn from(i: i64) -> Self {
        EntityValue::Literal(Literal::Integer(i))
    }
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityValue::Absent => write!(f, "<absent>"),
            EntityValue::Any => write!(f, "<any>"),
            EntityValue::Optional => write!(f, "<optional>"),
            EntityValue::Literal(lit) => write!(f, "{lit}"),
            EntityValue::OneOf(lits) => {
                let parts: Vec<String> = lits.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// The value a file actually carries for a queried key.
#[derive(Debug, Clone, Copy)]
pub enum Observed<'a> {
    /// Entity parsed from the file name.
    Entity { raw: &'a str, integer: bool },
    /// Field from an inherited JSON sidecar.
    Metadata(&'a JsonValue),
}

impl Observed<'_> {
    fn matches(&self, lit: &Literal) -> bool {
        match self {
            Observed::Entity { raw, integer } => lit.matches_entity(raw, *integer),
            Observed::Metadata(JsonValue::Array(items)) => {
                items.iter().any(|item| lit.matches_json(item))
            }
            Observed::Metadata(value) => lit.matches_json(value),
        }
    }
}

/// Recognise a serialized query marker such as `<Query.NONE: 1>`.
///
/// Returns `None` when `s` is not marker-shaped at all, and `Some(Err(name))`
/// when it is marker-shaped but names no known marker.
fn parse_marker(s: &str) -> Option<Result<EntityValue, String>> {
    let inner = s
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(s);
    let rest = inner.strip_prefix("Query.")?;
    let name = rest.split(':').next().unwrap_or(rest).trim();
    Some(match name {
        "NONE" => Ok(EntityValue::Absent),
        "ANY" | "REQUIRED" => Ok(EntityValue::Any),
        "OPTIONAL" => Ok(EntityValue::Optional),
        other => Err(other.to_string()),
    })
}

struct EntityValueVisitor;

impl<'de> Visitor<'de> for EntityValueVisitor {
    type Value = EntityValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, \"*\", a query marker, a scalar, or a list of scalars")
    }

    fn visit_unit<E: de::Error>(self) -> Result<EntityValue, E> {
        Ok(EntityValue::Absent)
    }

    fn visit_none<E: de::Error>(self) -> Result<EntityValue, E> {
        Ok(EntityValue::Absent)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<EntityValue, E> {
        Ok(EntityValue::Literal(Literal::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntityValue, E> {
        Ok(EntityValue::Literal(Literal::Integer(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntityValue, E> {
        Ok(EntityValue::Literal(match i64::try_from(v) {
            Ok(i) => Literal::Integer(i),
            Err(_) => Literal::Unsigned(v),
        }))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<EntityValue, E> {
        Ok(EntityValue::Literal(Literal::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<EntityValue, E> {
        if v == ANY_SENTINEL {
            return Ok(EntityValue::Any);
        }
        match parse_marker(v) {
            Some(marker) => {
                marker.map_err(|name| E::custom(format!("unknown query marker `Query.{name}`")))
            }
            None => Ok(EntityValue::Literal(Literal::String(v.to_string()))),
        }
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<EntityValue, A::Error> {
        let mut lits = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<EntityValue>()? {
            match item {
                EntityValue::Literal(lit) => lits.push(lit),
                other => {
                    return Err(de::Error::custom(format!(
                        "query marker {other} is not allowed inside a list"
                    )))
                }
            }
        }
        Ok(EntityValue::OneOf(lits))
    }
}

impl<'de> Deserialize<'de> for EntityValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EntityValueVisitor)
    }
}

impl Serialize for EntityValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EntityValue::Absent => serializer.serialize_none(),
            EntityValue::Any => serializer.serialize_str(ANY_SENTINEL),
            EntityValue::Optional => serializer.serialize_str(OPTIONAL_MARKER),
            EntityValue::Literal(lit) => lit.serialize(serializer),
            EntityValue::OneOf(lits) => {
                let mut seq = serializer.serialize_seq(Some(lits.len()))?;
                for lit in lits {
                    seq.serialize_element(lit)?;
                }
                seq.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Buckets, templates and results
// ---------------------------------------------------------------------------

/// Constraints for one bucket: entity name → value. Unique keys, last write wins.
pub type EntityFilters = BTreeMap<String, EntityValue>;

/// A decoded filter file: bucket name → constraints.
pub type FilterFile = BTreeMap<String, EntityFilters>;

/// A named group of expected pipeline inputs and its constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub name: String,
    pub entities: EntityFilters,
}

impl Bucket {
    pub fn new<'a>(name: &str, entities: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Bucket {
            name: name.to_string(),
            entities: entities
                .into_iter()
                .map(|(k, v)| (k.to_string(), EntityValue::from(v)))
                .collect(),
        }
    }
}

/// Base query per bucket for one preprocessing pipeline, in report order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    pub buckets: Vec<Bucket>,
}

impl QueryTemplate {
    pub fn get(&self, name: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.name.as_str())
    }
}

/// Template buckets with the filter file laid over them.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedQuery {
    /// Queried buckets, in template order.
    pub buckets: Vec<Bucket>,
    /// Filter-file buckets with no template counterpart; never queried.
    pub unqueried: Vec<String>,
}

/// Matched files for one bucket, sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketFiles {
    pub bucket: String,
    pub files: Vec<PathBuf>,
}

/// Everything found for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectData {
    pub participant: String,
    pub buckets: Vec<BucketFiles>,
}

impl SubjectData {
    pub fn files(&self, bucket: &str) -> Option<&[PathBuf]> {
        self.buckets
            .iter()
            .find(|b| b.bucket == bucket)
            .map(|b| b.files.as_slice())
    }
}
