use serde::{Deserialize, Serialize};

/// Wire shape of a field report, as posted by the mobile and web clients.
///
/// Everything is optional at the serde level so that a bad field becomes a
/// descriptive validation error during ingestion instead of a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub obstacle_type: Option<String>,
    #[serde(default)]
    pub height: Option<NumberOrText>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    /// GeoJSON-ish geometry, possibly wrapped in a `{"geometry": ...}` envelope
    /// or sent as a JSON string.
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    #[serde(default)]
    pub latitude: Option<NumberOrText>,
    #[serde(default)]
    pub longitude: Option<NumberOrText>,
    #[serde(default)]
    pub reporter_id: Option<NumberOrText>,
    #[serde(default)]
    pub reporter_email: Option<String>,
    /// Base64 data URL.
    #[serde(default)]
    pub photo: Option<String>,
}

/// Form clients send numbers as strings; native clients send JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberOrText {
    /// Finite float value, if there is one.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            NumberOrText::Int(i) => *i as f64,
            NumberOrText::Float(f) => *f,
            NumberOrText::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    /// Integral value, if there is one. `12.0` counts, `12.5` does not.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrText::Int(i) => Some(*i),
            NumberOrText::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            NumberOrText::Float(_) => None,
            NumberOrText::Text(s) => s.trim().parse::<i64>().ok(),
        }
    }

    /// True for empty strings, which clients send for untouched form fields.
    pub fn is_blank(&self) -> bool {
        matches!(self, NumberOrText::Text(s) if s.trim().is_empty())
    }
}

impl From<f64> for NumberOrText {
    fn from(value: f64) -> Self {
        NumberOrText::Float(value)
    }
}

impl From<i64> for NumberOrText {
    fn from(value: i64) -> Self {
        NumberOrText::Int(value)
    }
}

impl From<&str> for NumberOrText {
    fn from(value: &str) -> Self {
        NumberOrText::Text(value.to_string())
    }
}
