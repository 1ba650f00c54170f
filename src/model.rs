//! In-memory schema and point types shared across discovery, replication and replay.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;

/// A single retention policy on a database.
#[derive(Clone, Debug, PartialEq)]
pub struct RetentionPolicy {
    pub name: String,
    /// `None` or zero means infinite retention.
    pub duration: Option<ChronoDuration>,
    pub shard_group_duration: ChronoDuration,
    pub replication: u32,
    pub is_default: bool,
}

impl RetentionPolicy {
    /// `duration`, treating a zero-length duration the same as `None`
    /// (infinite retention).
    pub(crate) fn finite_duration(&self) -> Option<ChronoDuration> {
        self.duration.filter(|d| !d.is_zero())
    }

    /// Clamp `[now - max_retention, now]` to this policy's own retention window,
    /// returning `(start, end)` such that `end - start <= max_retention`.
    pub fn first_last_time(&self, now: DateTime<Utc>, max_retention: ChronoDuration) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = now;
        let start = match self.finite_duration() {
            Some(d) if d < max_retention => now - d,
            _ => now - max_retention,
        };
        (start, end)
    }
}

/// Field value type tag, as reported by the remote store's schema introspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Float,
    Integer,
    String,
    Boolean,
}

/// Per-measurement field name -> type map for one database.
pub type FieldTypes = BTreeMap<String, BTreeMap<String, FieldType>>;

/// Full schema description of one remote database, as discovered from the master.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaDb {
    pub name: String,
    pub default_rp_name: String,
    pub rps: Vec<RetentionPolicy>,
    pub field_types: FieldTypes,
}

impl SchemaDb {
    /// The retention policy marked `is_default`, if the schema is well-formed.
    pub fn default_rp(&self) -> Option<&RetentionPolicy> {
        self.rps.iter().find(|rp| rp.is_default)
    }

    pub fn non_default_rps(&self) -> impl Iterator<Item = &RetentionPolicy> {
        self.rps.iter().filter(|rp| !rp.is_default)
    }
}

/// A typed field value, already coerced from the remote row using `FieldType`.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
    Boolean(bool),
}

/// One row returned by a range query: tags, fields and a nanosecond timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub timestamp_ns: i64,
}

/// A typed point ready to be batch-written to the slave.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp_ns: i64,
}

/// Translate a raw row into a typed point, coercing values using the measurement's
/// field-type map. A field absent from the row, or with a `null` value, is omitted
/// from the resulting point.
pub fn row_to_point(measurement: &str, row: &Row, field_types: &BTreeMap<String, FieldType>) -> Point {
    let mut fields = BTreeMap::new();
    for (name, json_value) in &row.fields {
        if json_value.is_null() {
            continue;
        }
        let Some(ty) = field_types.get(name) else {
            continue;
        };
        if let Some(value) = coerce(json_value, *ty) {
            fields.insert(name.clone(), value);
        }
    }
    Point {
        measurement: measurement.to_string(),
        tags: row.tags.clone(),
        fields,
        timestamp_ns: row.timestamp_ns,
    }
}

fn coerce(value: &serde_json::Value, ty: FieldType) -> Option<FieldValue> {
    match ty {
        FieldType::Float => value.as_f64().map(FieldValue::Float),
        FieldType::Integer => value.as_i64().map(FieldValue::Integer),
        FieldType::Boolean => value.as_bool().map(FieldValue::Boolean),
        FieldType::String => value.as_str().map(|s| FieldValue::String(s.to_string())),
    }
}
