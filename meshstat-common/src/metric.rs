use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Flat metric namespace: dot-delimited metric name to value.
///
/// Ordered so that emitted output is stable between runs. Merging two maps
/// with `extend` keeps the last writer for a colliding key.
pub type MetricMap = BTreeMap<String, MetricValue>;

/// A single metric value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    /// Counter (non-negative integer).
    Counter(u64),

    /// Gauge (can go up or down, may be fractional or negative).
    Gauge(f64),

    /// Raw value that could not be interpreted as a number.
    Text(String),
}

impl MetricValue {
    /// Interpret a raw token the way kernel tables print them.
    ///
    /// Unsigned integers become counters, other numbers gauges, and anything
    /// else is kept verbatim.
    pub fn parse_numeric(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<u64>() {
            MetricValue::Counter(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            MetricValue::Gauge(v)
        } else {
            MetricValue::Text(raw.to_string())
        }
    }

    /// Convert a JSON scalar into a metric value.
    ///
    /// Returns `None` for objects, arrays and null.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(match n.as_u64() {
                Some(v) => MetricValue::Counter(v),
                None => MetricValue::Gauge(n.as_f64()?),
            }),
            serde_json::Value::Bool(b) => Some(MetricValue::Counter(u64::from(*b))),
            serde_json::Value::String(s) => Some(MetricValue::parse_numeric(s)),
            _ => None,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Counter(v) => Some(*v as f64),
            MetricValue::Gauge(v) => Some(*v),
            MetricValue::Text(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Counter(v) => write!(f, "{}", v),
            MetricValue::Gauge(v) => write!(f, "{}", v),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Counter(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Gauge(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

/// Return a copy of `metrics` with every key prefixed by `prefix.`.
pub fn with_prefix(prefix: &str, metrics: MetricMap) -> MetricMap {
    metrics
        .into_iter()
        .map(|(key, value)| (format!("{}.{}", prefix, key), value))
        .collect()
}

/// One poll cycle's worth of metrics, as handed to sinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    /// Unix epoch seconds when the cycle was collected.
    pub timestamp: i64,

    /// Host the metrics describe, inserted after the sink prefix when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// The merged metric mapping.
    pub metrics: MetricMap,
}

impl Batch {
    /// Create a batch stamped with the current time.
    pub fn new(source: Option<String>, metrics: MetricMap) -> Self {
        Self {
            timestamp: current_timestamp_secs(),
            source,
            metrics,
        }
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Get the current timestamp in seconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
