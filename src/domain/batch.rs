//! Batch records and dispatch requests
//!
//! A [`BatchRecord`] is one bakery-ops ADDITION flattened down to a single
//! (lot, vessel, ingredient, batch) combination. A [`BatchRequest`] is the
//! validated form of the loosely-typed JSON the review screens post back.

use super::quantity::Quantity;
use super::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields that must be present and truthy before a batch can be dispatched
pub const REQUIRED_FIELDS: [&str; 6] = [
    "action_id",
    "ingredient_id",
    "ingredient_name",
    "batch_id",
    "quantity",
    "unit",
];

/// Build the idempotency key of a transaction
///
/// `{ingredient_name}_{lot_number}_{vessel_code}_{normalized_quantity}`
pub fn unique_transaction_id(
    ingredient_name: &str,
    lot_number: &str,
    vessel_code: &str,
    quantity: &Quantity,
) -> String {
    format!(
        "{ingredient_name}_{lot_number}_{vessel_code}_{}",
        quantity.normalized()
    )
}

/// Remove the `{product}_` prefix once from a batch number
pub fn strip_product_prefix(batch_number: &str, product_name: &str) -> String {
    batch_number.replacen(&format!("{product_name}_"), "", 1)
}

/// One dispatchable ADDITION line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub action_id: String,
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub batch_id: String,
    pub batch_number: Option<String>,
    pub lot_number: String,
    pub quantity: f64,
    pub unit: String,
    /// Vessel display name
    pub vessel_id: String,
    pub vessel_code: String,
    pub action_date: String,
    pub depleted: bool,
    pub already_dispatched: bool,
    pub unique_transaction_id: String,
    pub bakery_system_lot_id: Option<String>,
    pub bakery_system_lot_code: String,
    pub bakery_system_lot_stage: Option<String>,
    pub bakery_system_lot_color: String,
}

/// Validated dispatch input
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub action_id: String,
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub batch_id: String,
    pub quantity: Quantity,
    pub unit: String,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    pub vessel_code: Option<String>,
    raw: Value,
}

impl BatchRequest {
    /// Validate a JSON batch object
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when required fields are missing or
    /// falsy, when the quantity is zero, or when it is not numeric.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = Self::ensure_required_fields(value)?;

        let quantity = Quantity::from_json(&obj["quantity"]).ok_or_else(|| {
            SyncError::Validation(format!("Quantity '{}' is not numeric", obj["quantity"]))
        })?;
        if quantity.is_zero() {
            return Err(SyncError::Validation(
                "Cannot dispatch batch with zero or null quantity. This transaction will be skipped."
                    .to_string(),
            ));
        }

        Ok(Self {
            action_id: text_field(obj, "action_id").unwrap_or_default(),
            ingredient_id: text_field(obj, "ingredient_id").unwrap_or_default(),
            ingredient_name: text_field(obj, "ingredient_name").unwrap_or_default(),
            batch_id: text_field(obj, "batch_id").unwrap_or_default(),
            quantity,
            unit: text_field(obj, "unit").unwrap_or_default(),
            batch_number: text_field(obj, "batch_number"),
            lot_number: text_field(obj, "lot_number"),
            vessel_code: text_field(obj, "vessel_code"),
            raw: value.clone(),
        })
    }

    /// Check that `value` is an object carrying every required field
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] listing the missing fields.
    pub fn ensure_required_fields(value: &Value) -> Result<&Map<String, Value>> {
        let obj = value
            .as_object()
            .ok_or_else(|| SyncError::Validation("Batch data must be a JSON object".to_string()))?;

        let missing = missing_required_fields(obj);
        if !missing.is_empty() {
            return Err(SyncError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(obj)
    }

    /// Idempotency key as stored in the dispatch ledger
    ///
    /// Uses the lot number and vessel code exactly as supplied by the
    /// caller, so records coming from the actions listing match the ledger.
    pub fn unique_transaction_id(&self) -> String {
        unique_transaction_id(
            &self.ingredient_name,
            self.lot_number.as_deref().unwrap_or(""),
            self.vessel_code.as_deref().unwrap_or(""),
            &self.quantity,
        )
    }

    /// Lot number from the request or derived from the batch number
    pub fn extract_lot_number(&self) -> Option<String> {
        if let Some(lot) = self.lot_number.as_deref().filter(|l| !l.is_empty()) {
            return Some(lot.to_string());
        }
        self.batch_number
            .as_deref()
            .filter(|b| !b.is_empty())
            .map(|b| strip_product_prefix(b, &self.ingredient_name))
            .filter(|lot| !lot.is_empty())
    }

    /// The JSON object the request was built from
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

fn missing_required_fields(obj: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| obj.get(*field).map_or(true, is_falsy))
        .collect()
}

/// Loose truthiness used for required-field checks
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

pub(crate) fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "action_id": "act-1",
            "ingredient_id": 42,
            "ingredient_name": "B_FLOUR",
            "batch_id": "b-9",
            "batch_number": "B_FLOUR_LOT77",
            "quantity": 12.5,
            "unit": "kg",
            "vessel_code": "V01"
        })
    }

    #[test]
    fn test_valid_request() {
        let req = BatchRequest::from_value(&sample()).unwrap();
        assert_eq!(req.ingredient_id, "42");
        assert_eq!(req.quantity.as_text(), "12.5");
        assert_eq!(req.vessel_code.as_deref(), Some("V01"));
    }

    #[test]
    fn test_missing_fields_listed_in_order() {
        let err = BatchRequest::from_value(&json!({"ingredient_name": "X", "quantity": ""}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required fields: action_id, ingredient_id, batch_id, quantity, unit"
        );
    }

    #[test]
    fn test_numeric_zero_counts_as_missing() {
        let mut v = sample();
        v["quantity"] = json!(0);
        let err = BatchRequest::from_value(&v).unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields: quantity");
    }

    #[test]
    fn test_string_zero_is_rejected() {
        let mut v = sample();
        v["quantity"] = json!("0.0");
        let err = BatchRequest::from_value(&v).unwrap_err();
        assert!(err.to_string().starts_with("Cannot dispatch batch with zero"));
    }

    #[test]
    fn test_unique_transaction_id_uses_given_lot() {
        let req = BatchRequest::from_value(&sample()).unwrap();
        // lot_number was not supplied, so it is empty in the key
        assert_eq!(req.unique_transaction_id(), "B_FLOUR__V01_12.5");

        let mut v = sample();
        v["lot_number"] = json!("LOT77");
        let req = BatchRequest::from_value(&v).unwrap();
        assert_eq!(req.unique_transaction_id(), "B_FLOUR_LOT77_V01_12.5");
    }

    #[test]
    fn test_extract_lot_number_from_batch_number() {
        let req = BatchRequest::from_value(&sample()).unwrap();
        assert_eq!(req.extract_lot_number().as_deref(), Some("LOT77"));
    }

    #[test]
    fn test_extract_lot_number_prefers_explicit_lot() {
        let mut v = sample();
        v["lot_number"] = json!("L-1");
        let req = BatchRequest::from_value(&v).unwrap();
        assert_eq!(req.extract_lot_number().as_deref(), Some("L-1"));
    }

    #[test]
    fn test_strip_product_prefix_only_once() {
        assert_eq!(strip_product_prefix("A_A_1", "A"), "A_1");
        assert_eq!(strip_product_prefix("OTHER_1", "A"), "OTHER_1");
    }
}
