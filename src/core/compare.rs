//! Side-by-side views of JDE and bakery-ops data
//!
//! Both comparisons are read-only. Ingredients are matched to JDE rows by
//! name, ignoring case.

use crate::domain::preserve_quantity_precision;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

pub const LIVE_DAYS_BACK: i64 = 5;
pub const ITEM_MASTER_DAYS_BACK: i64 = 30;
pub const DEFAULT_GL_CATEGORY: &str = "WA01";

/// Matching state of a cardex transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiveStatus {
    #[serde(rename = "Product Not Found")]
    ProductNotFound,
    #[serde(rename = "Dispatched")]
    Dispatched,
    #[serde(rename = "Partial Match")]
    PartialMatch,
    #[serde(rename = "Missing in Bakery Ops")]
    Missing,
}

/// One cardex transaction compared with bakery-ops stock
#[derive(Debug, Clone, Serialize)]
pub struct LiveComparisonRow {
    pub transaction_id: Option<String>,
    pub product_name: Option<String>,
    pub batch_name: Option<String>,
    pub lot_number: Option<String>,
    pub jde_quantity: f64,
    pub jde_unit: String,
    pub jde_date: String,
    pub bakery_ops_quantity: f64,
    pub bakery_ops_batches_count: usize,
    pub bakery_ops_id: Option<Value>,
    pub status: LiveStatus,
    pub dispatched: bool,
    pub can_dispatch: bool,
    pub raw_jde_data: Value,
    pub total_jde_quantity: f64,
    pub total_bakery_ops_quantity: f64,
}

/// One item master row compared with the bakery-ops catalogue
#[derive(Debug, Clone, Serialize)]
pub struct ItemMasterReviewRow {
    pub item_number: Option<String>,
    pub short_item_number: Option<String>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub jde_stocking_type: Option<String>,
    pub jde_item_type: Option<String>,
    pub jde_gl_class: Option<String>,
    pub jde_uom: Option<String>,
    pub status: &'static str,
    pub exists_in_bakery_ops: bool,
    pub product_id: Option<Value>,
    pub can_create: bool,
    pub raw_jde_data: Value,
}

/// Compare recent cardex transactions with bakery-ops on-hand stock
pub fn live_comparison(cardex_rows: &[Value], ingredients: &[Value]) -> Vec<LiveComparisonRow> {
    let index = IngredientIndex::new(ingredients);

    let mut jde_totals: HashMap<String, f64> = HashMap::new();
    for row in cardex_rows {
        if let Some(name) = field(row, "F4111_LITM") {
            *jde_totals.entry(name.to_lowercase()).or_default() += jde_quantity(row);
        }
    }

    cardex_rows
        .iter()
        .map(|row| {
            let product_name = field(row, "F4111_LITM");
            let lot_number = field(row, "F4111_LOTN");
            let batch_name = match (&product_name, &lot_number) {
                (Some(product), Some(lot)) => Some(format!("{product}_{lot}")),
                (product, None) => product.clone(),
                (None, Some(lot)) => Some(format!("None_{lot}")),
            };

            let key = product_name.as_deref().map(str::to_lowercase);
            let matched = key.as_deref().and_then(|k| index.first.get(k).copied());

            let (bakery_quantity, batches, bakery_id) = match matched {
                Some(ingredient) => (
                    on_hand_amount(ingredient),
                    on_hand_batches(ingredient),
                    ingredient_id(ingredient),
                ),
                None => (0.0, Vec::new(), None),
            };

            let dispatched = batch_name.as_deref().is_some_and(|name| {
                batches
                    .iter()
                    .any(|b| b.get("batchNumber").and_then(Value::as_str) == Some(name))
            });

            let status = if matched.is_none() {
                LiveStatus::ProductNotFound
            } else if dispatched {
                LiveStatus::Dispatched
            } else if bakery_quantity > 0.0 {
                LiveStatus::PartialMatch
            } else {
                LiveStatus::Missing
            };

            LiveComparisonRow {
                transaction_id: field(row, "F4111_DOC"),
                can_dispatch: !dispatched && product_name.is_some(),
                total_jde_quantity: key
                    .as_deref()
                    .and_then(|k| jde_totals.get(k).copied())
                    .unwrap_or(0.0),
                total_bakery_ops_quantity: key
                    .as_deref()
                    .and_then(|k| index.totals.get(k).copied())
                    .unwrap_or(0.0),
                product_name,
                batch_name,
                lot_number,
                jde_quantity: jde_quantity(row),
                jde_unit: field(row, "F4111_TRUM").unwrap_or_default(),
                jde_date: field(row, "F4111_TRDJ").unwrap_or_default(),
                bakery_ops_quantity: bakery_quantity,
                bakery_ops_batches_count: batches.len(),
                bakery_ops_id: bakery_id,
                status,
                dispatched,
                raw_jde_data: row.clone(),
            }
        })
        .collect()
}

/// Flag item master rows that have no bakery-ops ingredient yet
pub fn item_master_review(item_rows: &[Value], ingredients: &[Value]) -> Vec<ItemMasterReviewRow> {
    let index = IngredientIndex::new(ingredients);

    item_rows
        .iter()
        .map(|row| {
            let product_name = field(row, "F4102_LITM");
            let matched = product_name
                .as_deref()
                .and_then(|name| index.last.get(&name.to_lowercase()).copied());
            let exists = matched.is_some();

            ItemMasterReviewRow {
                item_number: field(row, "F4102_ITM"),
                short_item_number: product_name.clone(),
                description: field(row, "F4101_DSC1"),
                jde_stocking_type: field(row, "F4101_STKT"),
                jde_item_type: field(row, "F4101_SITMTYP"),
                jde_gl_class: field(row, "F4102_GLPT"),
                jde_uom: field(row, "F4101_UOM1"),
                status: if exists {
                    "Exists in Bakery Ops"
                } else {
                    "Missing in Bakery Ops"
                },
                exists_in_bakery_ops: exists,
                product_id: matched.and_then(ingredient_id),
                can_create: !exists && product_name.is_some(),
                product_name,
                raw_jde_data: row.clone(),
            }
        })
        .collect()
}

/// Ingredients by lower-cased name
struct IngredientIndex<'a> {
    /// First ingredient per name
    first: HashMap<String, &'a Value>,
    /// Last ingredient per name
    last: HashMap<String, &'a Value>,
    /// On-hand amount summed per name
    totals: HashMap<String, f64>,
}

impl<'a> IngredientIndex<'a> {
    fn new(ingredients: &'a [Value]) -> Self {
        let mut index = Self {
            first: HashMap::new(),
            last: HashMap::new(),
            totals: HashMap::new(),
        };
        for ingredient in ingredients {
            let Some(name) = ingredient_name(ingredient) else {
                continue;
            };
            let key = name.to_lowercase();
            index.first.entry(key.clone()).or_insert(ingredient);
            index.last.insert(key.clone(), ingredient);
            *index.totals.entry(key).or_default() += on_hand_amount(ingredient);
        }
        index
    }
}

fn ingredient_name(ingredient: &Value) -> Option<&str> {
    ingredient
        .get("name")
        .or_else(|| ingredient.get("productName"))
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
}

fn ingredient_id(ingredient: &Value) -> Option<Value> {
    ingredient
        .get("_id")
        .or_else(|| ingredient.get("product_id"))
        .filter(|id| !id.is_null())
        .cloned()
}

fn on_hand_amount(ingredient: &Value) -> f64 {
    ingredient
        .pointer("/onHand/amount")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn on_hand_batches(ingredient: &Value) -> Vec<Value> {
    ingredient
        .pointer("/onHand/batches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn jde_quantity(row: &Value) -> f64 {
    row.get("F4111_TRQT")
        .map_or(0.0, preserve_quantity_precision)
}

/// Non-null row value as text
fn field(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cardex(product: &str, lot: Option<&str>, qty: f64) -> Value {
        json!({
            "F4111_LITM": product,
            "F4111_DOC": 1001,
            "F4111_LOTN": lot,
            "F4111_TRQT": qty,
            "F4111_TRUM": "KG",
            "F4111_TRDJ": "06/03/2025"
        })
    }

    fn ingredient(name: &str, amount: f64, batches: &[&str]) -> Value {
        let batches: Vec<Value> = batches.iter().map(|b| json!({"batchNumber": b})).collect();
        json!({"_id": 77, "name": name, "onHand": {"amount": amount, "batches": batches}})
    }

    #[test]
    fn test_live_statuses() {
        let rows = vec![
            cardex("GHOST", Some("L1"), 1.0),
            cardex("B_FLOUR", Some("L1"), 2.0),
            cardex("P_SUGAR", Some("L9"), 3.0),
            cardex("M_YEAST", None, 4.0),
        ];
        let ingredients = vec![
            ingredient("b_flour", 0.0, &["B_FLOUR_L1"]),
            ingredient("P_SUGAR", 12.5, &["P_SUGAR_L1"]),
            ingredient("M_YEAST", 0.0, &[]),
        ];

        let result = live_comparison(&rows, &ingredients);
        let statuses: Vec<LiveStatus> = result.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                LiveStatus::ProductNotFound,
                LiveStatus::Dispatched,
                LiveStatus::PartialMatch,
                LiveStatus::Missing,
            ]
        );

        assert!(result[0].can_dispatch);
        assert!(!result[1].can_dispatch);
        assert_eq!(result[1].batch_name.as_deref(), Some("B_FLOUR_L1"));
        assert_eq!(result[3].batch_name.as_deref(), Some("M_YEAST"));
        assert_eq!(result[2].bakery_ops_quantity, 12.5);
        assert_eq!(result[2].bakery_ops_id, Some(json!(77)));
        assert_eq!(result[0].transaction_id.as_deref(), Some("1001"));
    }

    #[test]
    fn test_live_totals_ignore_case() {
        let rows = vec![
            cardex("B_FLOUR", Some("L1"), 2.0),
            cardex("b_flour", Some("L2"), 0.5),
        ];
        let ingredients = vec![ingredient("B_FLOUR", 1.0, &[]), ingredient("B_Flour", 4.0, &[])];

        let result = live_comparison(&rows, &ingredients);
        assert_eq!(result[0].total_jde_quantity, 2.5);
        assert_eq!(result[1].total_jde_quantity, 2.5);
        assert_eq!(result[0].total_bakery_ops_quantity, 5.0);
        assert_eq!(result[0].bakery_ops_quantity, 1.0);
    }

    #[test]
    fn test_status_serializes_as_label() {
        assert_eq!(
            serde_json::to_value(LiveStatus::Missing).unwrap(),
            json!("Missing in Bakery Ops")
        );
    }

    #[test]
    fn test_item_master_review() {
        let rows = vec![
            json!({"F4102_ITM": 60021, "F4102_LITM": "P_SUGAR", "F4101_UOM1": "KG", "F4101_STKT": "S"}),
            json!({"F4102_ITM": 60022, "F4102_LITM": "P_SALT", "F4101_UOM1": "KG"}),
            json!({"F4102_ITM": 60023, "F4102_LITM": null}),
        ];
        let ingredients = vec![ingredient("p_sugar", 0.0, &[])];

        let result = item_master_review(&rows, &ingredients);
        assert_eq!(result[0].status, "Exists in Bakery Ops");
        assert_eq!(result[0].product_id, Some(json!(77)));
        assert_eq!(result[0].item_number.as_deref(), Some("60021"));
        assert_eq!(result[0].jde_stocking_type.as_deref(), Some("S"));
        assert!(!result[0].can_create);

        assert_eq!(result[1].status, "Missing in Bakery Ops");
        assert!(result[1].can_create);

        assert!(!result[2].can_create);
        assert_eq!(result[2].product_name, None);
    }
}
