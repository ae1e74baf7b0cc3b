//! JDE orchestrator integration
//!
//! Reads come from two databrowse orchestrations (cardex and item master);
//! writes go to the inventory adjustment orchestration.

pub mod client;

pub use client::{extract_rowset, JdeClient, CARDEX_FORM, ITEM_MASTER_FORM};

use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Raw answer of the inventory adjustment orchestration
#[derive(Debug, Clone, PartialEq)]
pub struct JdeResponse {
    pub status: u16,
    pub body: String,
    /// Parsed body when it was JSON
    pub json: Option<Value>,
}

impl JdeResponse {
    pub fn new(status: u16, body: String) -> Self {
        let json = serde_json::from_str(&body).ok();
        Self { status, body, json }
    }

    /// 200 and 201 count as accepted
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201)
    }

    /// Body as stored in the ledger: re-serialized JSON, else the raw text
    pub fn status_text(&self) -> String {
        match &self.json {
            Some(json) => json.to_string(),
            None => self.body.clone(),
        }
    }
}

/// Access to the JDE orchestrator
#[async_trait]
pub trait JdeGateway: Send + Sync {
    /// Cardex rows for a business unit since `r_date` (`dd/mm/YYYY`)
    async fn fetch_cardex(&self, business_unit: &str, r_date: &str) -> Result<Vec<Value>>;

    /// Item master rows for a business unit and GL category
    async fn fetch_item_master(
        &self,
        business_unit: &str,
        r_date: &str,
        gl_category: &str,
    ) -> Result<Vec<Value>>;

    /// Whether the adjustment endpoint and credentials are configured
    fn dispatch_configured(&self) -> bool;

    /// Submit an inventory adjustment
    ///
    /// Non-success statuses are returned, not raised.
    async fn post_inventory_adjustment(&self, payload: &Value) -> Result<JdeResponse>;
}
