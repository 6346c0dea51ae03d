//! Point model shared by the normalizer, the delta tracker and the sink.
//!
//! A [`MetricPoint`] is the `{fields, tags}` pair produced for one measurement
//! stream. [`Measurements`] maps the measurement name of every stream emitted
//! in a tick to its point.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Name of one measurement stream, e.g. `cpu`, `disk_sda`, `fan_coretemp_0`.
///
/// Doubles as the delta-tracking key for cumulative series.
pub type MeasurementKey = String;

/// All points collected during one tick, keyed by measurement name.
pub type Measurements = BTreeMap<MeasurementKey, MetricPoint>;

/// A raw attribute value from a source record, also used for field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Zero of the same numeric kind. Text is left untouched.
    pub fn zeroed(&self) -> Value {
        match self {
            Value::Integer(_) => Value::Integer(0),
            Value::Float(_) => Value::Float(0.0),
            Value::Text(s) => Value::Text(s.clone()),
        }
    }

    /// `self - previous`. Integer pairs stay integral (wrapping, so a counter
    /// reset shows up as a negative delta); any float operand promotes the
    /// result. Text has no difference and is passed through.
    pub fn minus(&self, previous: &Value) -> Value {
        match (self, previous) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_sub(*b)),
            (Value::Integer(a), Value::Float(b)) => Value::Float(*a as f64 - b),
            (Value::Float(a), Value::Integer(b)) => Value::Float(a - *b as f64),
            (Value::Float(a), Value::Float(b)) => Value::Float(a - b),
            (current, _) => current.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One measurement's data: numeric fields and string tags.
///
/// Fields and tags are disjoint partitions of the record the point was built
/// from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricPoint {
    pub fields: BTreeMap<String, Value>,
    pub tags: BTreeMap<String, String>,
}

impl MetricPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}
