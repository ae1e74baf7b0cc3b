//! Unit-of-measure conversion between JDE and bakery-ops
//!
//! JDE uses two-letter upper-case codes (`KG`, `EA`, `LT`, ...). Bakery-ops
//! uses free-form names (`kg`, `each`, `L`, ...). Addition rates are
//! expressed per litre on the bakery side.

use crate::domain::{Result, SyncError};
use serde_json::{json, Map, Value};

/// JDE code → bakery-ops unit
pub const UNIT_MAP: [(&str, &str); 10] = [
    ("KG", "kg"),
    ("EA", "each"),
    ("LT", "L"),
    ("M2", "m2"),
    ("C2", "c2"),
    ("PK", "pack"),
    ("ST", "ST"),
    ("FN", "FN"),
    ("GR", "g"),
    ("ML", "mL"),
];

/// JDE code → bakery-ops addition rate unit
pub const RATE_UNIT_MAP: [(&str, &str); 6] = [
    ("KG", "g/L"),
    ("EA", "each/L"),
    ("LT", "mL/L"),
    ("M2", "m2/L"),
    ("C2", "c2/L"),
    ("PK", "pack/L"),
];

const CONVERSION_FACTORS: [((&str, &str), f64); 13] = [
    (("KG", "g"), 1000.0),
    (("KG", "L"), 1.0),
    (("g", "KG"), 0.001),
    (("L", "KG"), 1.0),
    (("L", "ml"), 1000.0),
    (("ml", "L"), 0.001),
    (("EA", "EA"), 1.0),
    (("each", "EA"), 1.0),
    (("pack", "PK"), 1.0),
    (("c2", "M2"), 1.0),
    (("m2", "C2"), 1.0),
    (("KG", "kg"), 1.0),
    (("kg", "KG"), 1.0),
];

/// Conversion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    FromJde,
    ToJde,
}

fn forward(map: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    map.iter().find(|(jde, _)| *jde == key).map(|(_, bakery)| *bakery)
}

fn reverse(map: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    map.iter().find(|(_, bakery)| *bakery == key).map(|(jde, _)| *jde)
}

/// Convert a unit between JDE and bakery-ops forms
///
/// Unknown units pass through lower-cased (towards bakery-ops) or
/// upper-cased (towards JDE).
pub fn convert_unit(unit: &str, direction: Direction) -> String {
    match direction {
        Direction::FromJde => forward(&UNIT_MAP, &unit.to_uppercase())
            .map(str::to_string)
            .unwrap_or_else(|| unit.to_lowercase()),
        Direction::ToJde => reverse(&UNIT_MAP, unit)
            .or_else(|| reverse(&UNIT_MAP, &unit.to_lowercase()))
            .map(str::to_string)
            .unwrap_or_else(|| unit.to_uppercase()),
    }
}

/// Convert an addition rate unit between JDE and bakery-ops forms
pub fn convert_rate_unit(unit: &str, direction: Direction) -> String {
    match direction {
        Direction::FromJde => forward(&RATE_UNIT_MAP, &unit.to_uppercase())
            .map(str::to_string)
            .unwrap_or_else(|| unit.to_lowercase()),
        Direction::ToJde => reverse(&RATE_UNIT_MAP, &unit.to_lowercase())
            .map(str::to_string)
            .unwrap_or_else(|| unit.to_uppercase()),
    }
}

/// Reject units that have no JDE mapping
///
/// Empty units are accepted.
pub fn validate_unit(unit: &str, field_name: &str) -> Result<()> {
    if unit.is_empty() {
        return Ok(());
    }
    if forward(&UNIT_MAP, &unit.to_uppercase()).is_none() {
        let available: Vec<String> = UNIT_MAP.iter().map(|(k, _)| format!("'{k}'")).collect();
        return Err(SyncError::Validation(format!(
            "Unit '{unit}' for {field_name} is not in available mappings. Available units: [{}]",
            available.join(", ")
        )));
    }
    Ok(())
}

/// True for an exact (case-sensitive) JDE unit code
pub fn is_jde(unit: &str) -> bool {
    forward(&UNIT_MAP, unit).is_some()
}

/// Scale a quantity from one unit to another
///
/// Pairs missing from the factor table convert 1:1.
pub fn convert_unit_quantity(source_unit: &str, target_unit: &str, quantity: f64) -> f64 {
    let normalize = |u: &str| {
        if is_jde(u) {
            u.to_uppercase()
        } else {
            u.to_lowercase()
        }
    };
    let source = normalize(source_unit);
    let target = normalize(target_unit);

    if source == target {
        return quantity;
    }

    let multiplier = CONVERSION_FACTORS
        .iter()
        .find(|((s, t), _)| *s == source && *t == target)
        .map_or(1.0, |(_, factor)| *factor);

    quantity * multiplier
}

/// All mapping tables, for diagnostics
pub fn unit_tables() -> Value {
    let to_object = |pairs: &[(&str, &str)], flip: bool| -> Value {
        let map: Map<String, Value> = pairs
            .iter()
            .map(|(a, b)| {
                let (k, v) = if flip { (b, a) } else { (a, b) };
                (k.to_string(), Value::String(v.to_string()))
            })
            .collect();
        Value::Object(map)
    };

    json!({
        "unit_map": to_object(&UNIT_MAP[..], false),
        "reverse_unit_map": to_object(&UNIT_MAP[..], true),
        "rate_unit_map": to_object(&RATE_UNIT_MAP[..], false),
        "reverse_rate_unit_map": to_object(&RATE_UNIT_MAP[..], true),
    })
}
