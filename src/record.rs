use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Number, Value};

/// Keys every document carries; statistics may not override them.
pub const RESERVED_KEYS: [&str; 3] = ["name", "type", "@timestamp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Counters,
    Timers,
    TimerData,
    Gauges,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Counters => "counters",
            RecordKind::Timers => "timers",
            RecordKind::TimerData => "timer_data",
            RecordKind::Gauges => "gauges",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document destined for the bulk body.
///
/// Serializes as `{name, <fields>..., "@timestamp", type}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub kind: RecordKind,
    /// Milliseconds since the epoch.
    pub timestamp: u64,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(name: &str, kind: RecordKind, timestamp: u64) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            timestamp,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Reserved keys are silently ignored.
    pub fn insert(&mut self, key: &str, value: Value) {
        if !RESERVED_KEYS.contains(&key) {
            self.fields.insert(key.to_owned(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 3))?;
        map.serialize_entry("name", &self.name)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("@timestamp", &self.timestamp)?;
        map.serialize_entry("type", self.kind.as_str())?;
        map.end()
    }
}

/// Zero and NaN are falsy.
pub fn is_truthy_number(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(is_truthy_number),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Integral values become JSON integers so `5.0` goes out as `5`.
/// Non-finite values become `null`.
pub fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}
