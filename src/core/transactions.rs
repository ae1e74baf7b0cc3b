//! JDE cardex transactions → bakery-ops batch receipts
//!
//! Each cardex row becomes a `RECEIVE_DRY_GOOD` action on the batch
//! `{product}_{lot}` of the ingredient named by `F4111_LITM`. Missing
//! ingredients and batches are created on the way. The JDE document number
//! (`F4111_DOC`) is written into the action notes as
//! `JDE_Transaction_Id: {doc}`; a row whose document number already appears
//! on an existing batch is skipped, which makes resubmission safe.

use crate::adapters::bakery_ops::BakeryOpsGateway;
use crate::core::archive::DataLakeArchive;
use crate::core::ingredients::{id_text, row_text, IngredientCatalog};
use crate::domain::{preserve_quantity_precision, Result, SyncError};
use crate::log_error_with_context;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Databrowse form carrying cardex rows
pub const CARDEX_FORM: &str = "fs_DATABROWSE_V4111A";

/// Dispatch type under which posted receipts are archived
pub const ARCHIVE_TYPE_TO_BAKERY_OPS: &str = "to_bakery_ops";

const TRANSACTION_NOTE: &str = "JDE_Transaction_Id:";

/// What happened to the rows of one submission
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionReport {
    /// Bakery-ops answers to the posted actions
    pub posted: Vec<Value>,
    /// One reason per row that was not posted
    pub skipped: Vec<String>,
}

/// Wrap one cardex row the way the JDE orchestrator returns it
pub fn transaction_envelope(row: &Value) -> Value {
    json!({
        "ServiceRequest1": {
            CARDEX_FORM: {
                "data": {"gridData": {"rowset": [row]}}
            }
        }
    })
}

/// Cardex rows of an orchestrator-shaped payload
///
/// # Errors
///
/// Returns [`SyncError::Validation`] when the rowset is missing or not an
/// array.
pub fn envelope_rows(payload: &Value) -> Result<Vec<Value>> {
    payload
        .pointer(&format!("/ServiceRequest1/{CARDEX_FORM}/data/gridData/rowset"))
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| {
            SyncError::Validation(format!(
                "jde_payload must contain ServiceRequest1.{CARDEX_FORM}.data.gridData.rowset"
            ))
        })
}

/// `{product}_{lot}`, or the product alone without a lot
pub fn batch_name(product: &str, lot: Option<&str>) -> String {
    match lot.filter(|l| !l.is_empty()) {
        Some(lot) => format!("{product}_{lot}"),
        None => product.to_string(),
    }
}

/// JDE document numbers recorded in the notes of batch actions
pub fn transaction_ids_in_notes(actions: &[Value]) -> Vec<String> {
    actions
        .iter()
        .filter_map(|action| action.get("notes").and_then(Value::as_array))
        .flatten()
        .filter_map(|note| note.get("text").and_then(Value::as_str))
        .filter(|text| text.contains(TRANSACTION_NOTE))
        .map(|text| text.replace(TRANSACTION_NOTE, "").trim().to_string())
        .collect()
}

/// Vendor ids are numeric on bakery-ops; keep anything else as text
fn vendor_value(vendor_id: &str) -> Value {
    vendor_id
        .parse::<i64>()
        .map_or_else(|_| json!(vendor_id), |id| json!(id))
}

/// Create payload for a batch named `batch_name`
pub fn build_batch_payload(ingredient_id: &str, batch_name: &str, vendor_id: &str) -> Value {
    json!({
        "_id": null,
        "batchNumber": batch_name,
        "manufacturerBatchId": batch_name,
        "depleted": false,
        "onHand": null,
        "categoryFields": {"expirationDate": null},
        "expirationDate": null,
        "costOnHand": null,
        "defaultVendor": {"_id": vendor_id},
        "tags": [],
        "notes": [{"text": format!("IngredientId: {ingredient_id}, Batch: {batch_name}")}],
    })
}

/// `RECEIVE_DRY_GOOD` action booking one cardex row onto `batch`
pub fn build_receipt_action(
    ingredient_id: &Value,
    batch: &Value,
    row: &Value,
    batch_name: &str,
    vendor_id: &str,
) -> Value {
    let text = |key: &str| row_text(row, key).unwrap_or_default();
    let vendor = vendor_value(vendor_id);

    let mut posted_row = row.clone();
    if let Some(fields) = posted_row.as_object_mut() {
        fields.insert("POSTED_PRODUCTID".into(), json!(text("F4111_LITM")));
        fields.insert("POSTED_BATCHID".into(), json!(batch_name));
    }

    json!({
        "actionData": {
            "batch": {
                "_id": batch.get("_id"),
                "publicId": batch.get("publicId"),
                "batchNumber": batch.get("batchNumber"),
                "manufacturerBatchId": batch.get("manufacturerBatchId"),
                "depleted": false,
                "onHand": 1,
                "categoryFields": {"expirationDate": null},
                "ingredientId": ingredient_id,
                "defaultVendorId": vendor,
                "tags": [],
                "archived": false,
                "defaultVendor": {"_id": vendor, "outletId": null},
                "displayString": format!(
                    "#{}_{}_{}",
                    text("F4111_LITM"),
                    text("F4111_ITM"),
                    text("F4111_DOC")
                ),
            },
            "vendor": {"_id": vendor},
            "numberOfItems": 1,
            "itemSize": row.get("F4111_TRQT").map_or(0.0, preserve_quantity_precision),
        },
        "actionType": "RECEIVE_DRY_GOOD",
        "tags": [],
        "notes": [
            {"text": format!("{TRANSACTION_NOTE} {}", text("F4111_DOC"))},
            {"text": posted_row.to_string()},
            {"text": format!("JDE_batch_name: {}", text("F4111_LOTN"))},
        ],
    })
}

/// Non-empty text under `key` (strings or numbers)
fn body_text(body: &Value, key: &str) -> Option<String> {
    row_text(body, key).filter(|v| !v.trim().is_empty())
}

fn body_object<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key)
        .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
}

/// Cardex → bakery-ops receipt flow
pub struct TransactionSync {
    bakery_ops: Arc<dyn BakeryOpsGateway>,
    ingredients: Arc<IngredientCatalog>,
    default_vendor_id: String,
    archive: Option<Arc<DataLakeArchive>>,
}

impl TransactionSync {
    pub fn new(
        bakery_ops: Arc<dyn BakeryOpsGateway>,
        ingredients: Arc<IngredientCatalog>,
        default_vendor_id: impl Into<String>,
    ) -> Self {
        Self {
            bakery_ops,
            ingredients,
            default_vendor_id: default_vendor_id.into(),
            archive: None,
        }
    }

    /// Archive posted receipts
    pub fn with_archive(mut self, archive: Option<Arc<DataLakeArchive>>) -> Self {
        self.archive = archive;
        self
    }

    /// `/prepare_transaction_payload`: the payload `/dispatch/transaction`
    /// would submit, for review
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when `transaction_id` or
    /// `raw_jde_data` is missing.
    pub fn prepare(&self, body: &Value) -> Result<Value> {
        let (Some(transaction_id), Some(raw)) =
            (body_text(body, "transaction_id"), body_object(body, "raw_jde_data"))
        else {
            return Err(SyncError::Validation(
                "Missing transaction_id or raw_jde_data".to_string(),
            ));
        };

        let summary = |key: &str| {
            raw.get(key)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| json!("N/A"))
        };

        Ok(json!({
            "success": true,
            "payload": transaction_envelope(raw),
            "transaction_id": transaction_id,
            "raw_jde_data": raw,
            "payload_summary": {
                "product_name": summary("F4111_LITM"),
                "quantity": summary("F4111_TRQT"),
                "unit": summary("F4111_TRUM"),
                "lot_number": summary("F4111_LOTN"),
                "document_number": summary("F4111_DOC"),
            },
        }))
    }

    /// `/dispatch/prepared_transaction`: `{jde_payload, transaction_id}`
    pub async fn dispatch_prepared(&self, body: &Value) -> Result<Value> {
        let (Some(payload), Some(transaction_id)) =
            (body_object(body, "jde_payload"), body_text(body, "transaction_id"))
        else {
            return Err(SyncError::Validation(
                "Missing jde_payload or transaction_id".to_string(),
            ));
        };

        let report = self.submit(payload).await?;
        Ok(self.respond(&transaction_id, report).await)
    }

    /// `/dispatch/transaction`: `{transaction_id, raw_jde_data}`
    pub async fn dispatch_raw(&self, body: &Value) -> Result<Value> {
        let (Some(transaction_id), Some(raw)) =
            (body_text(body, "transaction_id"), body_object(body, "raw_jde_data"))
        else {
            return Err(SyncError::Validation(
                "Missing transaction_id or raw_jde_data".to_string(),
            ));
        };

        let report = self.submit(&transaction_envelope(raw)).await?;
        Ok(self.respond(&transaction_id, report).await)
    }

    /// Post a receipt for every row of an orchestrator-shaped payload
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for a payload without rowset and
    /// bakery-ops errors as they occur; rows posted before the error stay
    /// posted and are skipped on resubmission.
    pub async fn submit(&self, payload: &Value) -> Result<SubmissionReport> {
        let mut report = SubmissionReport::default();
        for row in envelope_rows(payload)? {
            self.submit_row(&row, &mut report).await?;
        }

        tracing::info!(
            posted = report.posted.len(),
            skipped = report.skipped.len(),
            "Submitted cardex transactions"
        );
        Ok(report)
    }

    async fn submit_row(&self, row: &Value, report: &mut SubmissionReport) -> Result<()> {
        let Some(product) = body_text(row, "F4111_LITM") else {
            report.skipped.push("Row has no product name (F4111_LITM)".to_string());
            return Ok(());
        };

        let Some(ingredient) = self
            .ingredients
            .fetch_or_create_from_cardex(&product, row)
            .await?
        else {
            tracing::error!(product = %product, "Ingredient could not be found or created");
            report
                .skipped
                .push(format!("Ingredient {product} could not be found or created"));
            return Ok(());
        };
        let ingredient_id = ingredient.get("_id").cloned().unwrap_or(Value::Null);
        let ingredient_key = id_text(&ingredient_id);

        let lot = body_text(row, "F4111_LOTN");
        let name = batch_name(&product, lot.as_deref());
        let document = body_text(row, "F4111_DOC");

        let Some((batch, is_new)) = self.fetch_or_create_batch(&ingredient_key, &name).await? else {
            tracing::warn!(batch = %name, "Batch could not be found or created");
            report
                .skipped
                .push(format!("Batch {name} could not be found or created"));
            return Ok(());
        };
        let batch_id = id_text(batch.get("_id").unwrap_or(&Value::Null));

        if !is_new {
            if let Some(document) = document.as_deref() {
                if self
                    .transaction_exists(&ingredient_key, &batch_id, document)
                    .await?
                {
                    tracing::info!(
                        document = %document,
                        batch = %name,
                        "Transaction already recorded on batch, not posting"
                    );
                    report.skipped.push(format!(
                        "Transaction {document} already exists in batch actions"
                    ));
                    return Ok(());
                }
            }
        }

        let action = build_receipt_action(&ingredient_id, &batch, row, &name, &self.default_vendor_id);
        let posted = self.bakery_ops.post_action(&action).await?;
        tracing::info!(
            document = document.as_deref().unwrap_or(""),
            batch = %name,
            new_batch = is_new,
            "Posted batch receipt"
        );
        report.posted.push(posted.unwrap_or(Value::Null));
        Ok(())
    }

    /// Open batch whose number equals `batch_name` (trimmed, ignoring case),
    /// created when missing; the flag tells whether it was created
    pub async fn fetch_or_create_batch(
        &self,
        ingredient_id: &str,
        batch_name: &str,
    ) -> Result<Option<(Value, bool)>> {
        let wanted = batch_name.trim().to_lowercase();
        let existing = self
            .bakery_ops
            .list_batches(ingredient_id)
            .await?
            .into_iter()
            .find(|batch| {
                row_text(batch, "batchNumber")
                    .is_some_and(|n| n.trim().to_lowercase() == wanted)
            });
        if let Some(batch) = existing {
            return Ok(Some((batch, false)));
        }

        tracing::info!(ingredient_id = %ingredient_id, batch = %batch_name, "Creating batch");
        let payload = build_batch_payload(ingredient_id, batch_name, &self.default_vendor_id);
        let created = match self.bakery_ops.create_batch(ingredient_id, &payload).await? {
            Some(Value::Array(mut items)) if !items.is_empty() => Some(items.swap_remove(0)),
            Some(Value::Array(_)) | None => None,
            Some(batch) => Some(batch),
        };
        Ok(created.map(|batch| (batch, true)))
    }

    /// True when an action on the batch already carries `document` in its
    /// notes
    pub async fn transaction_exists(
        &self,
        ingredient_id: &str,
        batch_id: &str,
        document: &str,
    ) -> Result<bool> {
        let actions = self
            .bakery_ops
            .list_batch_actions(ingredient_id, batch_id)
            .await?;
        let recorded = transaction_ids_in_notes(&actions);
        tracing::debug!(batch_id = %batch_id, recorded = ?recorded, "JDE transactions on batch");
        Ok(recorded.iter().any(|id| id == document))
    }

    async fn respond(&self, transaction_id: &str, report: SubmissionReport) -> Value {
        if report.posted.is_empty() {
            return json!({
                "success": false,
                "message": format!("Failed to dispatch transaction {transaction_id}"),
                "skipped": report.skipped,
            });
        }

        self.archive_receipts(transaction_id, &report.posted).await;
        json!({
            "success": true,
            "message": format!("Transaction {transaction_id} dispatched successfully"),
            "result": report.posted,
            "skipped": report.skipped,
        })
    }

    async fn archive_receipts(&self, transaction_id: &str, posted: &[Value]) {
        let Some(archive) = &self.archive else {
            return;
        };

        let now = Utc::now();
        let records: Vec<Value> = posted
            .iter()
            .map(|action| {
                json!({
                    "transaction_id": transaction_id,
                    "dispatched_at": now.to_rfc3339(),
                    "action": action,
                })
            })
            .collect();

        if let Err(e) = archive
            .archive_dispatch(ARCHIVE_TYPE_TO_BAKERY_OPS, &records, now)
            .await
        {
            log_error_with_context!(&e, "Failed to archive batch receipts to data lake");
        }
    }
}
