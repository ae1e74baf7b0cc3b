//! Bakery-ops platform integration

pub mod client;

pub use client::BakeryOpsClient;

use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Status and body of a delete call
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub status: u16,
    pub body: String,
}

/// Access to the bakery-ops outlet API
///
/// Lookups return `None` (or an empty list) when the API answers with an
/// empty list.
#[async_trait]
pub trait BakeryOpsGateway: Send + Sync {
    /// ADDITION actions effective since `start_date` (`YYYY-MM-DD`)
    async fn fetch_actions(&self, start_date: &str) -> Result<Vec<Value>>;

    /// Every non-archived ingredient with batches and notes
    async fn list_ingredients(&self) -> Result<Vec<Value>>;

    /// Ingredients matching a free-text query, best match first
    async fn search_ingredients(&self, name: &str) -> Result<Vec<Value>>;

    async fn get_ingredient(&self, id: &str) -> Result<Option<Value>>;

    async fn create_ingredient(&self, payload: &Value) -> Result<Option<Value>>;

    /// Replace an ingredient (PUT)
    async fn update_ingredient(&self, id: &str, payload: &Value) -> Result<Option<Value>>;

    /// Delete an ingredient; the status is returned rather than raised
    async fn delete_ingredient(&self, id: &str) -> Result<DeleteOutcome>;

    /// Open (not archived, not depleted) batches of an ingredient
    async fn list_batches(&self, ingredient_id: &str) -> Result<Vec<Value>>;

    async fn create_batch(&self, ingredient_id: &str, payload: &Value) -> Result<Option<Value>>;

    /// Actions recorded against one batch, with their notes
    async fn list_batch_actions(&self, ingredient_id: &str, batch_id: &str) -> Result<Vec<Value>>;

    /// Post an outlet action (e.g. a `RECEIVE_DRY_GOOD` receipt)
    async fn post_action(&self, payload: &Value) -> Result<Option<Value>>;
}
