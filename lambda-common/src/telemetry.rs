use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// One published bus value, as it travels over Zenoh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPoint {
    /// Unix epoch milliseconds when the value was written.
    pub timestamp: i64,

    /// Bus service the value belongs to (e.g. "lambda_40").
    pub source: String,

    /// Bus path (e.g. "/Ac/Power").
    pub path: String,

    pub value: TelemetryValue,

    /// Human-readable rendering of `value` (e.g. "1520.0W").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

impl TelemetryPoint {
    /// Create a new point stamped with the current time.
    pub fn new(source: impl Into<String>, path: impl Into<String>, value: TelemetryValue) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            source: source.into(),
            path: path.into(),
            value,
            text: None,
            labels: HashMap::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Typed bus value.
///
/// Untagged on the wire: non-negative integers decode as `Counter`,
/// other numbers as `Gauge`, strings as `Text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TelemetryValue {
    Counter(u64),
    Gauge(f64),
    Text(String),
}

impl TelemetryValue {
    /// Numeric view of the value, `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TelemetryValue::Counter(v) => Some(*v as f64),
            TelemetryValue::Gauge(v) => Some(*v),
            TelemetryValue::Text(_) => None,
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Counter(v) => write!(f, "{}", v),
            TelemetryValue::Gauge(v) => write!(f, "{}", v),
            TelemetryValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<u64> for TelemetryValue {
    fn from(v: u64) -> Self {
        TelemetryValue::Counter(v)
    }
}

impl From<u8> for TelemetryValue {
    fn from(v: u8) -> Self {
        TelemetryValue::Counter(u64::from(v))
    }
}

impl From<f64> for TelemetryValue {
    fn from(v: f64) -> Self {
        TelemetryValue::Gauge(v)
    }
}

impl From<String> for TelemetryValue {
    fn from(v: String) -> Self {
        TelemetryValue::Text(v)
    }
}

impl From<&str> for TelemetryValue {
    fn from(v: &str) -> Self {
        TelemetryValue::Text(v.to_string())
    }
}

/// Current time in milliseconds since the Unix epoch (0 if the clock is before it).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_creation() {
        let point = TelemetryPoint::new("lambda_40", "/Ac/Power", TelemetryValue::Gauge(1520.0))
            .with_text("1520.0W")
            .with_label("unit", "W");

        assert_eq!(point.source, "lambda_40");
        assert_eq!(point.path, "/Ac/Power");
        assert_eq!(point.text.as_deref(), Some("1520.0W"));
        assert_eq!(point.labels.get("unit"), Some(&"W".to_string()));
        assert!(point.timestamp > 0);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(TelemetryValue::from(7u8), TelemetryValue::Counter(7));
        assert_eq!(TelemetryValue::from(-1.5), TelemetryValue::Gauge(-1.5));
        assert_eq!(
            TelemetryValue::from("LAMBDA EU13L"),
            TelemetryValue::Text("LAMBDA EU13L".to_string())
        );
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(TelemetryValue::Counter(3).as_f64(), Some(3.0));
        assert_eq!(TelemetryValue::Gauge(23.45).as_f64(), Some(23.45));
        assert_eq!(TelemetryValue::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn test_untagged_json_shapes() {
        let counter: TelemetryValue = serde_json::from_str("12").unwrap();
        let negative: TelemetryValue = serde_json::from_str("-1").unwrap();
        let text: TelemetryValue = serde_json::from_str("\"auto\"").unwrap();

        assert_eq!(counter, TelemetryValue::Counter(12));
        assert_eq!(negative, TelemetryValue::Gauge(-1.0));
        assert_eq!(text, TelemetryValue::Text("auto".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(TelemetryValue::Gauge(0.001).to_string(), "0.001");
        assert_eq!(TelemetryValue::Counter(255).to_string(), "255");
    }
}
