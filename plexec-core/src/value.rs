//! Dynamic value type for lookups, variables and command data.
//!
//! Null plays the role of UNKNOWN: a lookup that was never reported, a
//! variable that was never assigned, or a value reset after a failure.

use crate::error::{PlexecError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Dynamic value exchanged with the external world.
///
/// Wraps serde_json::Value so adapters can pass arbitrary payloads
/// through the executive unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(pub JsonValue);

impl Value {
    /// The unknown value.
    pub fn unknown() -> Self {
        Self(JsonValue::Null)
    }

    /// Create a boolean value.
    pub fn bool(v: bool) -> Self {
        Self(JsonValue::Bool(v))
    }

    /// Create an integer value.
    pub fn int(v: i64) -> Self {
        Self(JsonValue::Number(v.into()))
    }

    /// Create a floating-point value. Non-finite input yields unknown.
    pub fn real(v: f64) -> Self {
        Self(serde_json::Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number))
    }

    /// Create a string value.
    pub fn string(v: impl Into<String>) -> Self {
        Self(JsonValue::String(v.into()))
    }

    /// Parse a value from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map(Self)
            .map_err(|e| PlexecError::PlanParse(format!("invalid value '{}': {}", text, e)))
    }

    /// Check if the value is unknown.
    pub fn is_unknown(&self) -> bool {
        self.0.is_null()
    }

    /// Boolean view. Anything other than a JSON boolean is unknown.
    pub fn as_bool(&self) -> Option<bool> {
        self.0.as_bool()
    }

    /// Numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_f64()
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Three-valued equality: unknown on either side compares as unknown.
    ///
    /// Numbers compare by value so `1` and `1.0` are equal.
    pub fn equals(&self, other: &Value) -> Option<bool> {
        if self.is_unknown() || other.is_unknown() {
            return None;
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Some(a == b),
            _ => Some(self.0 == other.0),
        }
    }

    /// Access the inner serde_json::Value.
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            JsonValue::Null => f.write_str("UNKNOWN"),
            JsonValue::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Self(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::bool(v)
    }
}
