//! Database abstraction traits
//!
//! This module defines the traits that storage adapters must implement.
//! The HTTP layer only ever sees these traits, so tests can swap in
//! in-memory fakes.

use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

/// One row of the dispatch ledger
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    pub action_id: String,
    pub ingredient_id: String,
    /// Bakery-ops batch id
    pub lot_id: String,
    pub ingredient_name: String,
    pub addition_unit: String,
    /// JDE response, already truncated
    pub status_text: String,
    pub unique_transaction_id: String,
    pub vessel_code: Option<String>,
}

/// Ledger of transactions already submitted to JDE
#[async_trait]
pub trait DispatchLedger: Send + Sync {
    /// True when the transaction is recorded with status `done`
    async fn is_dispatched(&self, unique_transaction_id: &str) -> Result<bool>;

    /// All transaction ids recorded as `done`
    async fn dispatched_ids(&self) -> Result<HashSet<String>>;

    /// Insert or overwrite the ledger row keyed on the transaction id
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    async fn mark_dispatched(&self, record: &DispatchRecord) -> Result<()>;
}

/// A stored review session
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub session_id: String,
    pub batch_data: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Persistence for review sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Delete every session whose expiry has passed, returning how many went
    async fn purge_expired(&self) -> Result<u64>;

    async fn insert(
        &self,
        session_id: &str,
        batch_data: &Value,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Load a session that has not yet expired
    async fn fetch_active(&self, session_id: &str) -> Result<Option<StoredSession>>;

    /// Delete a session; false when nothing matched
    async fn delete(&self, session_id: &str) -> Result<bool>;
}

/// One registered version of a table schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaVersion {
    pub version: i32,
    pub schema: Value,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub description: Option<String>,
}

/// Versioned history of inferred table schemas
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Store a new version and return its number
    async fn register(
        &self,
        table_name: &str,
        schema: &Value,
        description: Option<&str>,
    ) -> Result<i32>;

    /// Newest version, if any
    async fn current(&self, table_name: &str) -> Result<Option<SchemaVersion>>;

    /// All versions, newest first
    async fn history(&self, table_name: &str) -> Result<Vec<SchemaVersion>>;
}
