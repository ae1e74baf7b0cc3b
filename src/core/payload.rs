//! Batch → JDE inventory adjustment payload
//!
//! The payload is what the JDE inventory adjustment orchestration expects:
//! one grid row per batch with the JDE unit and lot number, dated today in
//! UTC.

use crate::adapters::database::DispatchLedger;
use crate::core::units::{convert_unit, Direction};
use crate::domain::{BatchRequest, Result, SyncError};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

const BUSINESS_UNITS: [(&str, &str); 3] = [("B_", "1110"), ("P_", "1130"), ("M_", "1120")];

/// Business unit used when the product prefix is unknown
pub const DEFAULT_BUSINESS_UNIT: &str = "1110";

/// How to pick the lot number when the request carries none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotPolicy {
    /// Fall back to the bakery-ops batch id (preview flow)
    FallbackToBatchId,
    /// Refuse to build the payload (one-shot dispatch)
    Strict,
}

/// Branch plant derived from the product name prefix
pub fn determine_business_unit(product_name: &str) -> &'static str {
    BUSINESS_UNITS
        .iter()
        .find(|(prefix, _)| product_name.starts_with(prefix))
        .map_or(DEFAULT_BUSINESS_UNIT, |(_, bu)| bu)
}

/// Derived values reported alongside a prepared payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaInfo {
    pub converted_unit: String,
    pub determined_bu: String,
    pub extracted_lot_number: String,
}

/// A payload ready for review or submission
#[derive(Debug, Clone, Serialize)]
pub struct PreparedPayload {
    pub success: bool,
    pub jde_payload: Value,
    pub original_batch: Value,
    pub meta_info: MetaInfo,
}

/// Build the JDE payload for a validated request
///
/// # Errors
///
/// With [`LotPolicy::Strict`], returns [`SyncError::Validation`] when no
/// lot number can be determined.
pub fn build_jde_payload(
    request: &BatchRequest,
    policy: LotPolicy,
    today: NaiveDate,
) -> Result<(Value, MetaInfo)> {
    let converted_unit = match convert_unit(&request.unit, Direction::ToJde) {
        unit if unit.is_empty() => request.unit.clone(),
        unit => unit,
    };

    let business_unit = determine_business_unit(&request.ingredient_name);

    let lot_number = match (request.extract_lot_number(), policy) {
        (Some(lot), _) => lot,
        (None, LotPolicy::FallbackToBatchId) => request.batch_id.clone(),
        (None, LotPolicy::Strict) => {
            return Err(SyncError::Validation(
                "Unable to determine lot number".to_string(),
            ))
        }
    };

    let date = today.format("%d/%m/%Y").to_string();

    let payload = json!({
        "Branch_Plant": business_unit,
        "Document_Type": "II",
        "Explanation": format!(
            "BAKERYOPS. DEPL: {}:{}",
            request.ingredient_id, request.action_id
        ),
        "Select_Row": "1",
        "GridData": [{
            "Item_Number": request.ingredient_name,
            "Quantity": request.quantity.as_text(),
            "UM": converted_unit,
            "LOTN": lot_number,
        }],
        "G_L_Date": date,
        "Transaction_Date": date,
    });

    Ok((
        payload,
        MetaInfo {
            converted_unit,
            determined_bu: business_unit.to_string(),
            extracted_lot_number: lot_number,
        },
    ))
}

/// Fail when the ledger already holds the request's transaction
pub async fn ensure_not_dispatched(
    request: &BatchRequest,
    ledger: &dyn DispatchLedger,
) -> Result<String> {
    let transaction_id = request.unique_transaction_id();
    if ledger.is_dispatched(&transaction_id).await? {
        return Err(SyncError::AlreadyDispatched(transaction_id));
    }
    Ok(transaction_id)
}

/// Validate a batch and prepare its payload for preview
///
/// # Errors
///
/// Returns [`SyncError::Validation`] for missing fields or a zero quantity
/// and [`SyncError::AlreadyDispatched`] when the ledger holds the
/// transaction.
pub async fn prepare_jde_payload(
    batch: &Value,
    ledger: &dyn DispatchLedger,
    today: NaiveDate,
) -> Result<PreparedPayload> {
    let request = BatchRequest::from_value(batch)?;
    let transaction_id = ensure_not_dispatched(&request, ledger).await?;

    let (jde_payload, meta_info) = build_jde_payload(&request, LotPolicy::FallbackToBatchId, today)?;

    tracing::info!(
        transaction_id = %transaction_id,
        batch_id = %request.batch_id,
        bu = %meta_info.determined_bu,
        "Prepared JDE payload"
    );

    Ok(PreparedPayload {
        success: true,
        jde_payload,
        original_batch: batch.clone(),
        meta_info,
    })
}
