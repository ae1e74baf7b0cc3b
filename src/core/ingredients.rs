//! Bakery-ops ingredient maintenance driven by JDE item master rows
//!
//! Ingredients are matched to JDE items by name: the JDE short item number
//! (`F4102_LITM`) equals the bakery-ops ingredient name, ignoring case.

use crate::adapters::bakery_ops::BakeryOpsGateway;
use crate::core::units::{convert_unit, validate_unit, Direction};
use crate::domain::{BakeryOpsError, Result, SyncError};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Ingredient lookups and writes against bakery-ops
pub struct IngredientCatalog {
    bakery_ops: Arc<dyn BakeryOpsGateway>,
    default_vendor_id: String,
    product_type_id: i64,
}

impl IngredientCatalog {
    pub fn new(
        bakery_ops: Arc<dyn BakeryOpsGateway>,
        default_vendor_id: impl Into<String>,
        product_type_id: i64,
    ) -> Self {
        Self {
            bakery_ops,
            default_vendor_id: default_vendor_id.into(),
            product_type_id,
        }
    }

    /// Ingredient whose name equals `name`, ignoring case
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Value>> {
        let candidates = self.bakery_ops.search_ingredients(name).await?;
        Ok(candidates.into_iter().find(|candidate| {
            candidate
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        }))
    }

    /// # Errors
    ///
    /// [`SyncError::Validation`] for a blank name, [`SyncError::NotFound`]
    /// when no ingredient carries exactly that name.
    pub async fn search(&self, name: &str) -> Result<Value> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::Validation(
                "Ingredient name is required".to_string(),
            ));
        }

        self.find_by_name(name).await?.ok_or_else(|| {
            SyncError::NotFound(format!("Ingredient '{name}' not found in Bakery-System"))
        })
    }

    /// Bakery-ops create payload for a JDE item master row
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the item number, name or unit
    /// is missing, or the unit has no bakery-ops mapping.
    pub fn build_from_item_master(&self, row: &Value) -> Result<Value> {
        let item_id = required(row, "F4102_ITM", "Product Item ID (F4102_ITM) cannot be null")?;
        let item_name =
            required(row, "F4102_LITM", "Product Item Name (F4102_LITM) cannot be null")?;
        let description = row_text(row, "F4101_DSC1").unwrap_or_default();
        let jde_unit = required(row, "F4101_UOM1", "JDE Unit (F4101_UOM1) cannot be null")?;

        validate_unit(&jde_unit, "F4101_UOM1").map_err(|e| {
            SyncError::Validation(format!("Unit validation failed for Item Master data: {e}"))
        })?;
        let unit = convert_unit(&jde_unit, Direction::FromJde);

        let notes = format!(
            "F4102_ITM: {item_id}| F4102_LITM: {item_name}| F4101_DSC1: {}| F4101_UOM1: {jde_unit}",
            description.trim()
        );

        Ok(json!({
            "access": {"global": false, "owners": []},
            "manufacturer": null,
            "defaultVendor": {"_id": self.default_vendor_id},
            "productType": {"_id": self.product_type_id},
            "additionCustomUnit": {
                "additionCustomUnit": "false",
                "additionRateUnit": null,
                "additionRateValue": null,
                "additionUnit": unit,
            },
            "categoryFields": {
                "additionRateUnit": null,
                "additionRateValue": null,
                "additionUnit": unit,
                "additionCustomUnit": "false",
            },
            "inventoryUnit": unit,
            "name": item_name,
            "notes": [{"text": notes}],
            "tags": [],
        }))
    }

    /// Bakery-ops create payload for a JDE cardex row
    ///
    /// The inventory and addition units come from `F4111_TRUM`; rate
    /// fields stay empty.
    pub fn build_from_cardex(&self, row: &Value) -> Value {
        let unit = row_text(row, "F4111_TRUM")
            .map(|u| convert_unit(&u, Direction::FromJde))
            .map_or(Value::Null, Value::String);
        let name = row_text(row, "F4111_LITM").unwrap_or_default();

        let notes = ["F4111_TRDJ", "F4111_ITM", "F4111_LITM", "F4111_DCT"]
            .iter()
            .filter_map(|key| row_text(row, key).map(|v| format!("{key}: {}", v.trim())))
            .collect::<Vec<_>>()
            .join("| ");

        json!({
            "access": {"global": false, "owners": []},
            "manufacturer": null,
            "defaultVendor": null,
            "productType": {"_id": self.product_type_id},
            "additionCustomUnit": {
                "additionCustomUnit": "false",
                "additionRateUnit": null,
                "additionRateValue": null,
                "additionUnit": unit,
            },
            "categoryFields": {
                "additionRateUnit": null,
                "additionRateValue": null,
                "additionUnit": unit,
                "additionCustomUnit": "false",
            },
            "inventoryUnit": unit,
            "name": name,
            "tags": [],
            "notes": [{"text": notes}],
        })
    }

    /// Existing ingredient called `name`, or one created from an item
    /// master row
    ///
    /// A created ingredient is returned as `{item, _id}`.
    pub async fn fetch_or_create_from_item_master(
        &self,
        name: &str,
        row: &Value,
    ) -> Result<Option<Value>> {
        if let Some(existing) = self.find_by_name(name).await? {
            tracing::info!(ingredient = %name, "Reusing existing ingredient");
            return Ok(Some(existing));
        }

        let payload = self.build_from_item_master(row)?;
        tracing::info!(ingredient = %name, "Creating ingredient from item master");
        self.create(name, &payload).await
    }

    /// Existing ingredient called `name`, or one created from a cardex row
    pub async fn fetch_or_create_from_cardex(
        &self,
        name: &str,
        row: &Value,
    ) -> Result<Option<Value>> {
        if let Some(existing) = self.find_by_name(name).await? {
            return Ok(Some(existing));
        }

        tracing::info!(ingredient = %name, "Creating ingredient from cardex row");
        self.create(name, &self.build_from_cardex(row)).await
    }

    async fn create(&self, name: &str, payload: &Value) -> Result<Option<Value>> {
        let created = self.bakery_ops.create_ingredient(payload).await?;
        let result = created.as_ref().and_then(created_item);
        if result.is_none() {
            tracing::warn!(ingredient = %name, response = ?created, "Unexpected create response");
        }
        Ok(result)
    }

    /// `/create/ingredient`: `{raw_jde_data: <item master row>}`
    pub async fn create_from_request(&self, body: &Value) -> Result<Value> {
        let raw = present(body, "raw_jde_data")
            .ok_or_else(|| SyncError::Validation("Missing raw_jde_data".to_string()))?;

        let name = row_text(raw, "F4102_LITM")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                SyncError::Validation("Missing product name (F4102_LITM) in JDE data".to_string())
            })?;

        self.create_reported(&name, raw).await
    }

    /// `/prepare_ingredient_payload`: preview of an item master creation
    pub fn prepare_from_item_master(&self, body: &Value) -> Result<Value> {
        let raw = present(body, "raw_jde_data")
            .ok_or_else(|| SyncError::Validation("Missing raw_jde_data".to_string()))?;

        let name = row_text(raw, "F4102_LITM")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                SyncError::Validation("Missing product name (F4102_LITM) in JDE data".to_string())
            })?;

        let summary = |key: &str| row_text(raw, key).unwrap_or_else(|| "N/A".to_string());

        Ok(json!({
            "success": true,
            "payload": {
                "product_name": name,
                "item_data": raw,
                "ingredient_payload": self.build_from_item_master(raw).ok(),
                "payload_summary": {
                    "item_number": summary("F4102_LITM"),
                    "description": summary("F4101_DSC1"),
                    "unit_of_measure": summary("F4101_UOM1"),
                    "item_class": summary("F4102_STNC"),
                    "business_unit": summary("F4102_MCU"),
                },
            },
            "product_name": name,
            "raw_jde_data": raw,
        }))
    }

    /// `/create/prepared_ingredient`: `{product_name, raw_jde_data}`
    pub async fn create_prepared(&self, body: &Value) -> Result<Value> {
        let name = body_text(body, "product_name");
        let raw = present(body, "raw_jde_data");
        let (Some(name), Some(raw)) = (name, raw) else {
            return Err(SyncError::Validation(
                "Missing product_name or raw_jde_data".to_string(),
            ));
        };

        self.create_reported(&name, raw).await
    }

    async fn create_reported(&self, name: &str, raw: &Value) -> Result<Value> {
        Ok(match self.fetch_or_create_from_item_master(name, raw).await? {
            Some(result) => json!({
                "success": true,
                "message": format!("Ingredient {name} created successfully"),
                "result": result,
            }),
            None => json!({
                "success": false,
                "message": format!("Failed to create ingredient {name}"),
            }),
        })
    }

    /// `/patch/ingredient`: align an ingredient's units with a JDE row
    ///
    /// Item master rows (`F4102_LITM`) take their unit from `F4101_UOM1`,
    /// cardex rows (`F4111_LITM`) from `F4111_TRUM`. A missing ingredient is
    /// created first. Rate fields are cleared and the addition unit follows
    /// the inventory unit.
    pub async fn patch_from_jde(&self, body: &Value) -> Result<Value> {
        let raw = present(body, "raw_jde_data")
            .ok_or_else(|| SyncError::Validation("Missing raw_jde_data".to_string()))?;

        let source = JdeSource::detect(raw).ok_or_else(|| {
            let keys: Vec<&str> = raw
                .as_object()
                .map(|o| o.keys().map(String::as_str).collect())
                .unwrap_or_default();
            SyncError::Validation(format!(
                "Missing product name in JDE data. Available keys: {keys:?}"
            ))
        })?;
        let name = row_text(raw, source.name_field()).unwrap_or_default();

        let found = match source {
            JdeSource::ItemMaster => self.fetch_or_create_from_item_master(&name, raw).await?,
            JdeSource::Cardex => self.fetch_or_create_from_cardex(&name, raw).await?,
        };
        let Some(found) = found else {
            return Ok(json!({
                "success": false,
                "error": format!(
                    "Item '{name}' does not exist in Bakery-System and could not be created. \
                     Please add this item using Item Master review first."
                ),
                "ingredient_name": name,
            }));
        };

        // created ingredients come back wrapped as {item, _id}
        let mut ingredient = found.get("item").cloned().unwrap_or(found);
        let ingredient_id = id_text(ingredient.get("_id").unwrap_or(&Value::Null));
        let Some(fields) = ingredient.as_object_mut() else {
            return Err(BakeryOpsError::InvalidResponse(
                "Ingredient is not a JSON object".to_string(),
            )
            .into());
        };

        if let Some(jde_unit) = row_text(raw, source.unit_field()).filter(|u| !u.is_empty()) {
            validate_unit(&jde_unit, source.unit_field()).map_err(|e| {
                SyncError::Validation(format!(
                    "Unit validation failed during patch for {} data: {e}",
                    source.label()
                ))
            })?;
            let unit = convert_unit(&jde_unit, Direction::FromJde);
            if let Some(custom) = fields
                .get_mut("additionCustomUnit")
                .and_then(Value::as_object_mut)
            {
                custom.insert("additionUnit".into(), Value::String(unit.clone()));
            }
            fields.insert("inventoryUnit".into(), Value::String(unit));
        }

        let inventory_unit = str_field(fields, "inventoryUnit");
        reset_unit_fields(fields, &inventory_unit);

        tracing::info!(ingredient_id = %ingredient_id, unit = %inventory_unit, "Patching ingredient units");
        let updated = self
            .bakery_ops
            .update_ingredient(&ingredient_id, &ingredient)
            .await?;

        Ok(json!({
            "success": true,
            "message": format!("Ingredient {name} patched successfully (rate values set to None)"),
            "result": [updated],
        }))
    }

    /// Rename an ingredient and reset its units
    ///
    /// Units are applied as given, without conversion. The addition unit
    /// defaults to the resulting inventory unit and rate fields are cleared.
    pub async fn advanced_patch(&self, body: &Value) -> Result<Value> {
        let ingredient_name = body_text(body, "ingredient_name").ok_or_else(|| {
            SyncError::Validation("ingredient_name is required".to_string())
        })?;
        let new_name = body_text(body, "new_name");
        let new_inventory_unit = body_text(body, "new_inventory_unit");
        let new_addition_unit = body_text(body, "new_addition_unit");

        let mut ingredient = self.find_by_name(&ingredient_name).await?.ok_or_else(|| {
            SyncError::NotFound(format!(
                "Ingredient '{ingredient_name}' not found in Bakery-System"
            ))
        })?;
        let ingredient_id = ingredient.get("_id").cloned().unwrap_or(Value::Null);

        let Some(fields) = ingredient.as_object_mut() else {
            return Err(BakeryOpsError::InvalidResponse(
                "Ingredient is not a JSON object".to_string(),
            )
            .into());
        };

        let mut updates_made = Vec::new();

        if let Some(new_name) = new_name {
            let old_name = str_field(fields, "name");
            if new_name != old_name {
                updates_made.push(format!("name: '{old_name}' → '{new_name}'"));
                fields.insert("name".into(), Value::String(new_name));
            }
        }

        if let Some(unit) = new_inventory_unit {
            updates_made.push(format!(
                "inventoryUnit: '{}' → '{unit}'",
                str_field(fields, "inventoryUnit")
            ));
            fields.insert("inventoryUnit".into(), Value::String(unit));
        }

        let addition_unit = match new_addition_unit {
            Some(unit) => {
                let old = fields
                    .get("categoryFields")
                    .and_then(|c| c.get("additionUnit"))
                    .and_then(Value::as_str)
                    .unwrap_or("None");
                updates_made.push(format!("additionUnit: '{old}' → '{unit}'"));
                unit
            }
            None => {
                let unit = str_field(fields, "inventoryUnit");
                updates_made.push(format!("additionUnit set to match inventoryUnit: '{unit}'"));
                unit
            }
        };

        reset_unit_fields(fields, &addition_unit);
        let unit_fields = fields.get("categoryFields").cloned().unwrap_or(Value::Null);
        fields.insert("additionCustomUnit".into(), unit_fields);

        let id = id_text(&ingredient_id);
        tracing::info!(ingredient_id = %id, updates = ?updates_made, "Updating ingredient");

        let updated = self
            .bakery_ops
            .update_ingredient(&id, &ingredient)
            .await?
            .ok_or_else(|| {
                SyncError::Other("Failed to update Ingredient - API returned no content".to_string())
            })?;

        Ok(json!({
            "success": true,
            "message": format!("Successfully updated Ingredient '{ingredient_name}'"),
            "ingredient_id": ingredient_id,
            "updates_made": updates_made,
            "updated_Ingredient": updated,
        }))
    }

    /// Delete an ingredient, reporting the bakery-ops status
    pub async fn delete(&self, ingredient_id: &str) -> Result<Value> {
        let outcome = self.bakery_ops.delete_ingredient(ingredient_id).await?;
        tracing::info!(ingredient_id = %ingredient_id, status = outcome.status, "Delete ingredient");

        Ok(match outcome.status {
            200 | 204 => json!({
                "success": true,
                "message": format!("Ingredient {ingredient_id} deleted successfully"),
                "status_code": outcome.status,
            }),
            404 => json!({
                "success": false,
                "message": format!("Ingredient {ingredient_id} not found in Bakery-System"),
                "status_code": outcome.status,
                "error": outcome.body,
            }),
            _ => json!({
                "success": false,
                "message": format!("Failed to delete Ingredient {ingredient_id}"),
                "status_code": outcome.status,
                "error": outcome.body,
            }),
        })
    }
}

/// Where a JDE row passed to the patch endpoint comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JdeSource {
    ItemMaster,
    Cardex,
}

impl JdeSource {
    fn detect(row: &Value) -> Option<Self> {
        if row_text(row, "F4102_LITM").is_some() {
            Some(Self::ItemMaster)
        } else if row_text(row, "F4111_LITM").is_some() {
            Some(Self::Cardex)
        } else {
            None
        }
    }

    fn name_field(self) -> &'static str {
        match self {
            Self::ItemMaster => "F4102_LITM",
            Self::Cardex => "F4111_LITM",
        }
    }

    fn unit_field(self) -> &'static str {
        match self {
            Self::ItemMaster => "F4101_UOM1",
            Self::Cardex => "F4111_TRUM",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ItemMaster => "Item Master",
            Self::Cardex => "CARDEX",
        }
    }
}

/// Clear rate fields, vendor and indicators; the addition unit becomes
/// `addition_unit`
fn reset_unit_fields(fields: &mut Map<String, Value>, addition_unit: &str) {
    fields.insert(
        "categoryFields".into(),
        json!({
            "additionUnit": addition_unit,
            "additionRateUnit": null,
            "additionRateValue": null,
            "additionCustomUnit": false,
            "concentration": null,
            "instructions": "",
        }),
    );
    fields.insert("defaultVendorId".into(), Value::Null);
    fields.insert("defaultVendor".into(), Value::Null);
    fields.insert("indicators".into(), json!([]));
}

pub(crate) fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalize the create response to `{item, _id}`
fn created_item(response: &Value) -> Option<Value> {
    let item = match response {
        Value::Object(obj) if obj.contains_key("_id") => response,
        Value::Object(_) => response.pointer("/data/rowset/0")?,
        Value::Array(items) => items.first()?,
        _ => return None,
    };
    let id = item.get("_id")?.clone();
    Some(json!({"item": item, "_id": id}))
}

/// Value under `key` when it is not null or empty
fn present<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key)
        .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
}

pub(crate) fn row_text(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required(row: &Value, key: &str, message: &str) -> Result<String> {
    row_text(row, key).ok_or_else(|| SyncError::Validation(message.to_string()))
}

fn body_text(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn str_field(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
