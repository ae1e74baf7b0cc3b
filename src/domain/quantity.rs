//! Quantities exchanged between bakery-ops and JDE
//!
//! Quantities arrive as JSON numbers or strings. The original text is kept
//! for outgoing JDE payloads, while a decimal value drives comparisons and
//! transaction id generation.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Decimal places carried through the sync
pub const MAX_DECIMALS: u32 = 9;

/// A parsed quantity with its original textual form
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    value: Decimal,
    text: String,
}

impl Quantity {
    /// Parse a quantity from a JSON value
    ///
    /// Returns `None` for nulls, booleans, containers and strings that are
    /// not numeric.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Self::parse_text(&n.to_string()),
            Value::String(s) => Self::parse_text(s.trim()),
            _ => None,
        }
    }

    /// Build a quantity from a float
    pub fn from_f64(value: f64) -> Option<Self> {
        serde_json::Number::from_f64(value).and_then(|n| Self::parse_text(&n.to_string()))
    }

    fn parse_text(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        let value = Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()?;
        Some(Self {
            value,
            text: text.to_string(),
        })
    }

    /// The quantity as received, used verbatim in JDE payloads
    pub fn as_text(&self) -> &str {
        &self.text
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Quantity formatted for unique transaction ids
    ///
    /// At most nine decimals, trailing zeros and a dangling dot removed.
    pub fn normalized(&self) -> String {
        self.value
            .round_dp_with_strategy(MAX_DECIMALS, RoundingStrategy::MidpointNearestEven)
            .normalize()
            .to_string()
    }

    /// Quantity rounded half-up to nine decimals
    pub fn precise(&self) -> f64 {
        self.value
            .round_dp_with_strategy(MAX_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or_default()
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self {
            value: Decimal::ZERO,
            text: "0".to_string(),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.precise())
    }
}

/// Round a raw JSON quantity to nine decimals, treating anything unparseable as zero
pub fn preserve_quantity_precision(value: &Value) -> f64 {
    Quantity::from_json(value)
        .map(|q| q.precise())
        .unwrap_or(0.0)
}
