//! Submission of prepared payloads to JDE
//!
//! A dispatch re-checks the ledger, posts the adjustment and records the
//! transaction as `done` only when JDE accepts it. Accepted dispatches are
//! archived to the data lake when an archive is attached; archival errors
//! are logged and never change the outcome.

use crate::adapters::database::{DispatchLedger, DispatchRecord};
use crate::adapters::jde::{JdeGateway, JdeResponse};
use crate::core::archive::DataLakeArchive;
use crate::core::payload::{build_jde_payload, LotPolicy};
use crate::domain::context::ResultExt;
use crate::domain::{BatchRequest, JdeError, Result, SyncError};
use crate::{log_dispatch_outcome, log_error_with_context};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Longest JDE response kept in the ledger (column is `VARCHAR(700)`)
pub const STATUS_TEXT_LIMIT: usize = 699;

/// Dispatch type under which JDE submissions are archived
pub const ARCHIVE_TYPE_TO_JDE: &str = "to_jde";

/// Result of a dispatch attempt as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jde_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_sent: Option<Value>,
}

impl DispatchOutcome {
    fn failed(error: impl Into<String>, payload_sent: Option<Value>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            jde_response: None,
            payload_sent,
        }
    }
}

/// Truncate a JDE response to the ledger column width
pub fn truncate_status_text(text: &str) -> String {
    text.chars().take(STATUS_TEXT_LIMIT).collect()
}

pub struct Dispatcher {
    jde: Arc<dyn JdeGateway>,
    ledger: Arc<dyn DispatchLedger>,
    archive: Option<Arc<DataLakeArchive>>,
}

impl Dispatcher {
    pub fn new(jde: Arc<dyn JdeGateway>, ledger: Arc<dyn DispatchLedger>) -> Self {
        Self {
            jde,
            ledger,
            archive: None,
        }
    }

    /// Archive accepted dispatches
    pub fn with_archive(mut self, archive: Option<Arc<DataLakeArchive>>) -> Self {
        self.archive = archive;
        self
    }

    /// Submit a payload produced by the preview flow
    ///
    /// Refusals (missing credentials, already dispatched, JDE rejection or
    /// unreachable JDE) are reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when `batch_data` is not a valid
    /// batch, and database errors from the ledger.
    pub async fn dispatch_prepared_payload(
        &self,
        jde_payload: &Value,
        batch_data: &Value,
    ) -> Result<DispatchOutcome> {
        let request = BatchRequest::from_value(batch_data)?;

        if !self.jde.dispatch_configured() {
            return Ok(DispatchOutcome::failed(
                JdeError::NotConfigured.to_string(),
                None,
            ));
        }

        let transaction_id = request.unique_transaction_id();
        if self.ledger.is_dispatched(&transaction_id).await? {
            tracing::info!(transaction_id = %transaction_id, "Skipping dispatched transaction");
            return Ok(DispatchOutcome::failed(
                SyncError::AlreadyDispatched(transaction_id).to_string(),
                None,
            ));
        }

        let response = match self.jde.post_inventory_adjustment(jde_payload).await {
            Ok(response) => response,
            Err(e) => {
                log_error_with_context!(&e, "JDE inventory adjustment request failed");
                return Ok(DispatchOutcome::failed(
                    e.to_string(),
                    Some(jde_payload.clone()),
                ));
            }
        };

        let status_text = truncate_status_text(&response.status_text());
        log_dispatch_outcome!(transaction_id, response.status, response.is_success());

        if !response.is_success() {
            return Ok(DispatchOutcome::failed(
                format!("JDE API error {}: {status_text}", response.status),
                Some(jde_payload.clone()),
            ));
        }

        let record = DispatchRecord {
            action_id: request.action_id.clone(),
            ingredient_id: request.ingredient_id.clone(),
            lot_id: request.batch_id.clone(),
            ingredient_name: request.ingredient_name.clone(),
            addition_unit: request.unit.clone(),
            status_text: status_text.clone(),
            unique_transaction_id: transaction_id.clone(),
            vessel_code: request.vessel_code.clone(),
        };
        self.ledger
            .mark_dispatched(&record)
            .await
            .with_context(|| format!("JDE accepted {transaction_id} but the ledger update failed"))?;

        self.archive_dispatch(&transaction_id, jde_payload, batch_data, &response)
            .await;

        Ok(DispatchOutcome {
            success: true,
            message: Some(format!(
                "Successfully dispatched transaction {transaction_id} to JDE"
            )),
            error: None,
            jde_response: Some(status_text),
            payload_sent: Some(jde_payload.clone()),
        })
    }

    /// Build a strict payload for one batch and submit it
    ///
    /// The ledger is consulted before the payload is built, so a dispatched
    /// transaction is reported as such even when its lot is unknown. A zero
    /// quantity or an undeterminable lot number is reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when required fields are missing,
    /// and database errors from the ledger.
    pub async fn dispatch_single_batch(
        &self,
        batch: &Value,
        today: NaiveDate,
    ) -> Result<DispatchOutcome> {
        BatchRequest::ensure_required_fields(batch)?;
        let request = match BatchRequest::from_value(batch) {
            Ok(request) => request,
            Err(SyncError::Validation(msg)) => return Ok(DispatchOutcome::failed(msg, None)),
            Err(e) => return Err(e),
        };

        let transaction_id = request.unique_transaction_id();
        if self.ledger.is_dispatched(&transaction_id).await? {
            tracing::info!(transaction_id = %transaction_id, "Skipping dispatched transaction");
            return Ok(DispatchOutcome::failed(
                SyncError::AlreadyDispatched(transaction_id).to_string(),
                None,
            ));
        }

        let payload = match build_jde_payload(&request, LotPolicy::Strict, today) {
            Ok((payload, _)) => payload,
            Err(SyncError::Validation(msg)) => return Ok(DispatchOutcome::failed(msg, None)),
            Err(e) => return Err(e),
        };
        self.dispatch_prepared_payload(&payload, batch).await
    }

    async fn archive_dispatch(
        &self,
        transaction_id: &str,
        jde_payload: &Value,
        batch_data: &Value,
        response: &JdeResponse,
    ) {
        let Some(archive) = &self.archive else {
            return;
        };

        let now = Utc::now();
        let record = json!({
            "unique_transaction_id": transaction_id,
            "dispatched_at": now.to_rfc3339(),
            "jde_status": response.status,
            "jde_payload": jde_payload,
            "batch_data": batch_data,
        });

        if let Err(e) = archive
            .archive_dispatch(ARCHIVE_TYPE_TO_JDE, &[record], now)
            .await
        {
            log_error_with_context!(&e, "Failed to archive dispatch to data lake");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::s3::{DataLake, ObjectSummary};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Ledger {
        done: Mutex<HashSet<String>>,
        records: Mutex<Vec<DispatchRecord>>,
    }

    #[async_trait]
    impl DispatchLedger for Ledger {
        async fn is_dispatched(&self, id: &str) -> Result<bool> {
            Ok(self.done.lock().unwrap().contains(id))
        }
        async fn dispatched_ids(&self) -> Result<HashSet<String>> {
            Ok(self.done.lock().unwrap().clone())
        }
        async fn mark_dispatched(&self, record: &DispatchRecord) -> Result<()> {
            self.done
                .lock()
                .unwrap()
                .insert(record.unique_transaction_id.clone());
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct Jde {
        configured: bool,
        status: u16,
        body: String,
        posted: Mutex<Vec<Value>>,
    }

    impl Jde {
        fn answering(status: u16, body: &str) -> Self {
            Self {
                configured: true,
                status,
                body: body.to_string(),
                posted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JdeGateway for Jde {
        async fn fetch_cardex(&self, _bu: &str, _r_date: &str) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
        async fn fetch_item_master(&self, _bu: &str, _r: &str, _gl: &str) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
        fn dispatch_configured(&self) -> bool {
            self.configured
        }
        async fn post_inventory_adjustment(&self, payload: &Value) -> Result<JdeResponse> {
            self.posted.lock().unwrap().push(payload.clone());
            Ok(JdeResponse::new(self.status, self.body.clone()))
        }
    }

    struct FailingLake;

    #[async_trait]
    impl DataLake for FailingLake {
        async fn put_object(
            &self,
            _key: &str,
            _body: Vec<u8>,
            _content_type: &str,
            _metadata: HashMap<String, String>,
        ) -> Result<()> {
            Err(SyncError::Storage("bucket unavailable".to_string()))
        }
        async fn get_object(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn list_objects(&self, _prefix: &str) -> Result<Vec<ObjectSummary>> {
            Ok(Vec::new())
        }
    }

    fn batch() -> Value {
        json!({
            "action_id": "act-1",
            "ingredient_id": "ing-9",
            "ingredient_name": "P_SUGAR",
            "batch_id": "batch-3",
            "batch_number": "P_SUGAR_L5",
            "lot_number": "L5",
            "quantity": 2.5,
            "unit": "kg",
            "vessel_code": "T1"
        })
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn test_truncate_status_text() {
        let long = "é".repeat(800);
        assert_eq!(truncate_status_text(&long).chars().count(), 699);
        assert_eq!(truncate_status_text("ok"), "ok");
    }

    #[tokio::test]
    async fn test_successful_dispatch_marks_ledger() {
        let ledger = Arc::new(Ledger::default());
        let jde = Arc::new(Jde::answering(201, r#"{"ok": true}"#));
        let dispatcher = Dispatcher::new(jde.clone(), ledger.clone());

        let outcome = dispatcher
            .dispatch_single_batch(&batch(), today())
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Successfully dispatched transaction P_SUGAR_L5_T1_2.5 to JDE")
        );
        assert_eq!(outcome.jde_response.as_deref(), Some(r#"{"ok":true}"#));
        assert_eq!(
            outcome.payload_sent.as_ref().unwrap()["Branch_Plant"],
            "1130"
        );

        let records = ledger.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lot_id, "batch-3");
        assert_eq!(records[0].addition_unit, "kg");
        assert_eq!(records[0].vessel_code.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_second_dispatch_is_refused() {
        let ledger = Arc::new(Ledger::default());
        let jde = Arc::new(Jde::answering(200, "{}"));
        let dispatcher = Dispatcher::new(jde.clone(), ledger);

        assert!(dispatcher.dispatch_single_batch(&batch(), today()).await.unwrap().success);
        let second = dispatcher.dispatch_single_batch(&batch(), today()).await.unwrap();

        assert!(!second.success);
        assert_eq!(
            second.error.as_deref(),
            Some("Transaction P_SUGAR_L5_T1_2.5 already dispatched")
        );
        assert_eq!(jde.posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_dispatch_is_not_recorded() {
        let ledger = Arc::new(Ledger::default());
        let jde = Arc::new(Jde::answering(500, "Orchestration failed"));
        let dispatcher = Dispatcher::new(jde, ledger.clone());

        let payload = json!({"Branch_Plant": "1130"});
        let outcome = dispatcher
            .dispatch_prepared_payload(&payload, &batch())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("JDE API error 500: Orchestration failed")
        );
        assert_eq!(outcome.payload_sent, Some(payload));
        assert!(ledger.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_jde() {
        let mut jde = Jde::answering(200, "{}");
        jde.configured = false;
        let dispatcher = Dispatcher::new(Arc::new(jde), Arc::new(Ledger::default()));

        let outcome = dispatcher
            .dispatch_prepared_payload(&json!({}), &batch())
            .await
            .unwrap();
        assert_eq!(outcome.error.as_deref(), Some("JDE credentials not configured"));
    }

    #[tokio::test]
    async fn test_strict_dispatch_requires_lot_number() {
        let mut value = batch();
        let obj = value.as_object_mut().unwrap();
        obj.remove("lot_number");
        obj.remove("batch_number");

        let jde = Arc::new(Jde::answering(200, "{}"));
        let dispatcher = Dispatcher::new(jde.clone(), Arc::new(Ledger::default()));
        let outcome = dispatcher.dispatch_single_batch(&value, today()).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Unable to determine lot number"));
        assert!(jde.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_is_checked_before_lot_number() {
        let mut value = batch();
        value.as_object_mut().unwrap().remove("batch_number");
        value["lot_number"] = json!("");

        let ledger = Ledger::default();
        ledger.done.lock().unwrap().insert("P_SUGAR__T1_2.5".to_string());
        let dispatcher = Dispatcher::new(Arc::new(Jde::answering(200, "{}")), Arc::new(ledger));

        let outcome = dispatcher.dispatch_single_batch(&value, today()).await.unwrap();
        assert_eq!(
            outcome.error.as_deref(),
            Some("Transaction P_SUGAR__T1_2.5 already dispatched")
        );
    }

    #[tokio::test]
    async fn test_zero_quantity_is_reported() {
        let mut value = batch();
        value["quantity"] = json!("0.0");
        let dispatcher = Dispatcher::new(
            Arc::new(Jde::answering(200, "{}")),
            Arc::new(Ledger::default()),
        );

        let outcome = dispatcher.dispatch_single_batch(&value, today()).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome
            .error
            .unwrap()
            .starts_with("Cannot dispatch batch with zero or null quantity"));

        value["quantity"] = json!(0);
        let err = dispatcher.dispatch_single_batch(&value, today()).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields: quantity");
    }

    #[tokio::test]
    async fn test_archive_failure_does_not_fail_dispatch() {
        let archive = Arc::new(DataLakeArchive::new(Arc::new(FailingLake), "lake"));
        let dispatcher = Dispatcher::new(
            Arc::new(Jde::answering(200, "{}")),
            Arc::new(Ledger::default()),
        )
        .with_archive(Some(archive));

        let outcome = dispatcher.dispatch_single_batch(&batch(), today()).await.unwrap();
        assert!(outcome.success);
    }
}
