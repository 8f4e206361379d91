//! Tag - a time-ranged annotation on a track.
//!
//! Tags arrive from an external tag store and are trusted only loosely:
//! times may be missing, non-numeric, inverted or outside the media. Such
//! values are kept as-is (NaN for missing) and filtered at index/render time
//! rather than rejected at load time.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::color::Color;

/// Opaque tag identifier (ordered for deterministic tie-breaking)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn nan() -> f64 {
    f64::NAN
}

fn default_confidence() -> f32 {
    1.0
}

/// Accept numbers, numeric strings and null; anything unusable becomes NaN.
fn lenient_time<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tag_id: TagId,
    #[serde(default = "nan", deserialize_with = "lenient_time")]
    pub start_time: f64,
    #[serde(default = "nan", deserialize_with = "lenient_time")]
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured payload (e.g. detected object attributes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl Tag {
    pub fn new(tag_id: impl Into<TagId>, start_time: f64, end_time: f64) -> Self {
        Self {
            tag_id: tag_id.into(),
            start_time,
            end_time,
            text: None,
            content: None,
            confidence: 1.0,
            color: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Finite times with `start <= end`
    pub fn is_well_formed(&self) -> bool {
        self.start_time.is_finite() && self.end_time.is_finite() && self.start_time <= self.end_time
    }

    /// Instantaneous marker
    pub fn is_instant(&self) -> bool {
        self.start_time == self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Range clamped to `[0, duration]` for display. None if malformed.
    pub fn clamped_range(&self, duration: f64) -> Option<(f64, f64)> {
        if !self.is_well_formed() {
            return None;
        }
        let duration = duration.max(0.0);
        Some((
            self.start_time.clamp(0.0, duration),
            self.end_time.clamp(0.0, duration),
        ))
    }

    /// Confidence clamped into `0..1` (NaN counts as 0)
    pub fn confidence(&self) -> f32 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }

    /// Case-insensitive substring match on text and the string leaves of
    /// `content`. `needle` must already be lowercase; empty matches all.
    pub fn matches_filter(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        if self
            .text
            .as_ref()
            .is_some_and(|t| t.to_lowercase().contains(needle))
        {
            return true;
        }
        self.content
            .as_ref()
            .is_some_and(|c| value_contains(c, needle))
    }
}

fn value_contains(value: &serde_json::Value, needle: &str) -> bool {
    match value {
        serde_json::Value::String(s) => s.to_lowercase().contains(needle),
        serde_json::Value::Array(items) => items.iter().any(|v| value_contains(v, needle)),
        serde_json::Value::Object(map) => map.values().any(|v| value_contains(v, needle)),
        _ => false,
    }
}
