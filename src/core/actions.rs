//! Bakery-ops ADDITION actions flattened into dispatchable batch records

use crate::adapters::bakery_ops::BakeryOpsGateway;
use crate::adapters::database::DispatchLedger;
use crate::domain::{
    preserve_quantity_precision, strip_product_prefix, unique_transaction_id, BatchRecord,
    Quantity, Result,
};
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_DAYS_BACK: i64 = 3;

/// First effective date requested from bakery-ops
pub fn start_effective_date(today: NaiveDate, days_back: i64) -> NaiveDate {
    today - Duration::days(days_back)
}

struct IngredientInfo {
    name: String,
    unit: String,
}

struct BatchInfo {
    ingredient_id: String,
    batch_id: String,
    batch_number: Option<String>,
    depleted: bool,
}

/// Flatten ADDITION actions into one record per (lot, vessel, ingredient, batch)
///
/// Every batch of an ingredient receives the full addition quantity of the
/// vessel.
pub fn flatten_additions(actions: &[Value], dispatched: &HashSet<String>) -> Vec<BatchRecord> {
    let mut records = Vec::new();

    for action in actions {
        if action.get("actionType").and_then(Value::as_str) != Some("ADDITION") {
            continue;
        }

        let action_id = text(action.get("_id"));
        let action_date = text(action.get("effectiveAt"));
        let data = action.get("actionData");

        let (ingredients, batches) = index_ingredients(array(data, "ingredients"));

        for lot in array(data, "lots") {
            for vessel in lot.get("vessels").and_then(Value::as_array).into_iter().flatten() {
                let vessel_code = text(vessel.get("vesselCode"));
                let vessel_name = text(vessel.get("name"));
                let Some(additions) = vessel.get("additions").and_then(Value::as_object) else {
                    continue;
                };

                for (ingredient_id, change_value) in additions {
                    let (name, unit) = ingredients
                        .get(ingredient_id.as_str())
                        .map_or(("", ""), |i| (i.name.as_str(), i.unit.as_str()));

                    for batch in batches.iter().filter(|b| &b.ingredient_id == ingredient_id) {
                        let lot_number = batch
                            .batch_number
                            .as_deref()
                            .filter(|n| !n.is_empty())
                            .map(|n| strip_product_prefix(n, name))
                            .unwrap_or_default();

                        let normalized = Quantity::from_json(change_value)
                            .unwrap_or_default();
                        let transaction_id =
                            unique_transaction_id(name, &lot_number, &vessel_code, &normalized);

                        records.push(BatchRecord {
                            action_id: action_id.clone(),
                            ingredient_id: ingredient_id.clone(),
                            ingredient_name: name.to_string(),
                            batch_id: batch.batch_id.clone(),
                            batch_number: batch.batch_number.clone(),
                            lot_number,
                            quantity: preserve_quantity_precision(change_value),
                            unit: unit.to_string(),
                            vessel_id: vessel_name.clone(),
                            vessel_code: vessel_code.clone(),
                            action_date: action_date.clone(),
                            depleted: batch.depleted,
                            already_dispatched: dispatched.contains(&transaction_id),
                            unique_transaction_id: transaction_id,
                            bakery_system_lot_id: optional_text(lot.get("_id")),
                            bakery_system_lot_code: text(lot.get("lotCode")),
                            bakery_system_lot_stage: optional_text(lot.get("stage")),
                            bakery_system_lot_color: text(lot.get("color")),
                        });
                    }
                }
            }
        }
    }

    records
}

/// Fetch recent additions and flag those already in the ledger
pub async fn fetch_batch_records(
    bakery_ops: &dyn BakeryOpsGateway,
    ledger: &dyn DispatchLedger,
    today: NaiveDate,
    days_back: i64,
) -> Result<Vec<BatchRecord>> {
    let start = start_effective_date(today, days_back);
    let actions = bakery_ops
        .fetch_actions(&start.format("%Y-%m-%d").to_string())
        .await?;
    let dispatched = ledger.dispatched_ids().await?;

    let records = flatten_additions(&actions, &dispatched);
    tracing::info!(
        start = %start,
        actions = actions.len(),
        records = records.len(),
        dispatched = records.iter().filter(|r| r.already_dispatched).count(),
        "Flattened bakery-ops additions"
    );
    Ok(records)
}

fn index_ingredients(entries: &[Value]) -> (HashMap<String, IngredientInfo>, Vec<BatchInfo>) {
    let mut ingredients = HashMap::new();
    let mut batches = Vec::new();

    for entry in entries {
        let ingredient = entry.get("Ingredient");
        let ingredient_id = text(ingredient.and_then(|i| i.get("_id")));
        ingredients.insert(
            ingredient_id.clone(),
            IngredientInfo {
                name: text(ingredient.and_then(|i| i.get("productName"))),
                unit: text(ingredient.and_then(|i| i.get("additionUnit"))),
            },
        );

        for batch_entry in entry.get("batches").and_then(Value::as_array).into_iter().flatten() {
            let batch = batch_entry.get("batch");
            batches.push(BatchInfo {
                ingredient_id: ingredient_id.clone(),
                batch_id: text(batch.and_then(|b| b.get("_id"))),
                batch_number: optional_text(batch.and_then(|b| b.get("batchNumber"))),
                depleted: batch
                    .and_then(|b| b.get("depleted"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            });
        }
    }

    (ingredients, batches)
}

fn array<'a>(data: Option<&'a Value>, key: &str) -> &'a [Value] {
    data.and_then(|d| d.get(key))
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text(value: Option<&Value>) -> String {
    optional_text(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action() -> Value {
        json!({
            "_id": 9001,
            "actionType": "ADDITION",
            "effectiveAt": "2025-03-06T08:00:00Z",
            "actionData": {
                "ingredients": [{
                    "Ingredient": {"_id": 42, "productName": "B_FLOUR", "additionUnit": "kg"},
                    "batches": [
                        {"batch": {"_id": 7, "batchNumber": "B_FLOUR_LOT1", "depleted": false}},
                        {"batch": {"_id": 8, "batchNumber": "B_FLOUR_LOT2", "depleted": true}}
                    ]
                }],
                "lots": [{
                    "_id": 300,
                    "lotCode": "DOUGH-1",
                    "stage": "mixing",
                    "color": "#fff",
                    "vessels": [{
                        "_id": 55,
                        "vesselCode": "MX01",
                        "name": "Mixer 1",
                        "additions": {"42": 12.5}
                    }]
                }]
            }
        })
    }

    #[test]
    fn test_flatten_one_record_per_batch() {
        let records = flatten_additions(&[action()], &HashSet::new());
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.action_id, "9001");
        assert_eq!(first.ingredient_id, "42");
        assert_eq!(first.ingredient_name, "B_FLOUR");
        assert_eq!(first.batch_id, "7");
        assert_eq!(first.lot_number, "LOT1");
        assert_eq!(first.quantity, 12.5);
        assert_eq!(first.unit, "kg");
        assert_eq!(first.vessel_id, "Mixer 1");
        assert_eq!(first.vessel_code, "MX01");
        assert_eq!(first.unique_transaction_id, "B_FLOUR_LOT1_MX01_12.5");
        assert_eq!(first.bakery_system_lot_id.as_deref(), Some("300"));
        assert_eq!(first.bakery_system_lot_code, "DOUGH-1");
        assert!(!first.already_dispatched);

        assert!(records[1].depleted);
        assert_eq!(records[1].lot_number, "LOT2");
    }

    #[test]
    fn test_dispatched_records_are_flagged() {
        let dispatched = HashSet::from(["B_FLOUR_LOT2_MX01_12.5".to_string()]);
        let records = flatten_additions(&[action()], &dispatched);
        assert!(!records[0].already_dispatched);
        assert!(records[1].already_dispatched);
    }

    #[test]
    fn test_other_action_types_are_ignored() {
        let mut other = action();
        other["actionType"] = json!("TRANSFER");
        assert!(flatten_additions(&[other], &HashSet::new()).is_empty());
    }

    #[test]
    fn test_falsy_change_value() {
        let mut value = action();
        value["actionData"]["lots"][0]["vessels"][0]["additions"] = json!({"42": null});
        let records = flatten_additions(&[value], &HashSet::new());
        assert_eq!(records[0].quantity, 0.0);
        assert_eq!(records[0].unique_transaction_id, "B_FLOUR_LOT1_MX01_0");
    }

    #[test]
    fn test_start_effective_date() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert_eq!(
            start_effective_date(today, DEFAULT_DAYS_BACK),
            NaiveDate::from_ymd_opt(2025, 2, 27).unwrap()
        );
    }
}
