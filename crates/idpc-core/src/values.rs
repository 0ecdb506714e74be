//! Observation sets: the raw values a plugin produced at one instant.
//!
//! Values are JSON scalars keyed by metric name. Counters usually arrive as
//! numbers, but plugins scraping text protocols may hand over strings; the
//! formatter parses those per metric definition.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key → value mapping produced by a capability.
pub type ValueMap = BTreeMap<String, Value>;

/// Reserved key carrying the observation timestamp in the state file.
pub const LAST_TIME_KEY: &str = "_lastTime";

/// Prefix of the auxiliary entries recording the last computed rate.
pub const LAST_DIFF_PREFIX: &str = ".last_diff.";

/// Key of the auxiliary rate entry for `name`.
pub fn last_diff_key(name: &str) -> String {
    format!("{LAST_DIFF_PREFIX}{name}")
}

/// Values observed at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    pub values: ValueMap,
    /// Observation time; the Unix epoch when nothing was observed.
    pub timestamp: DateTime<Utc>,
}

impl ObservationSet {
    pub fn new(values: ValueMap, timestamp: DateTime<Utc>) -> Self {
        Self { values, timestamp }
    }

    /// Empty set with the zero timestamp.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the set carries a real observation time rather than the epoch.
    pub fn is_timestamped(&self) -> bool {
        self.timestamp != DateTime::<Utc>::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Rate recorded for `name` by the previous cycle, 0 when absent.
    pub fn last_diff(&self, name: &str) -> f64 {
        self.values
            .get(&last_diff_key(name))
            .map(to_f64)
            .unwrap_or(0.0)
    }

    /// Record the rate computed for `name` in this cycle.
    pub fn set_last_diff(&mut self, name: &str, rate: f64) {
        self.values.insert(last_diff_key(name), Value::from(rate));
    }
}

/// Lossy conversion to `u32`; unparseable values become 0.
pub fn to_u32(value: &Value) -> u32 {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(u) => u as u32,
            None => n.as_f64().map(|f| f as u32).unwrap_or(0),
        },
        Value::String(s) => s.parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}

/// Lossy conversion to `u64`; unparseable values become 0.
pub fn to_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(u) => u,
            None => n.as_f64().map(|f| f as u64).unwrap_or(0),
        },
        Value::String(s) => s.parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

/// Lossy conversion to `f64`; unparseable values become 0.
pub fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}
