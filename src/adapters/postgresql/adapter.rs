//! PostgreSQL adapter implementing the storage traits
//!
//! One adapter backs the dispatch ledger, review sessions and the schema
//! registry, sharing a single connection pool.

use crate::adapters::database::traits::{
    DispatchLedger, DispatchRecord, SchemaRegistry, SchemaVersion, SessionStore, StoredSession,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{schema_version_from_row, session_from_row};
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// PostgreSQL implementation of the storage traits
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl DispatchLedger for PostgreSQLAdapter {
    async fn is_dispatched(&self, unique_transaction_id: &str) -> Result<bool> {
        let rows = self
            .client
            .query(
                "SELECT status FROM ingredient_submitted_status \
                 WHERE unique_transaction_id = $1 AND status = 'done'",
                &[&unique_transaction_id],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn dispatched_ids(&self) -> Result<HashSet<String>> {
        let rows = self
            .client
            .query(
                "SELECT unique_transaction_id FROM ingredient_submitted_status WHERE status = 'done'",
                &[],
            )
            .await?;

        let ids: HashSet<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<_, String>(0).ok())
            .collect();

        tracing::debug!(count = ids.len(), "Loaded dispatched transaction ids");
        Ok(ids)
    }

    async fn mark_dispatched(&self, record: &DispatchRecord) -> Result<()> {
        let upsert_query = r#"
            INSERT INTO ingredient_submitted_status (
                action_id, ingredient_id, lot_id, ingredient_name, addition_unit,
                status_text, status, unique_transaction_id, vessel_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'done', $7, $8)
            ON CONFLICT (unique_transaction_id) DO UPDATE SET
                status_text = EXCLUDED.status_text,
                status = 'done',
                updated_at = NOW()
        "#;

        self.client
            .execute(
                upsert_query,
                &[
                    &record.action_id,
                    &record.ingredient_id,
                    &record.lot_id,
                    &record.ingredient_name,
                    &record.addition_unit,
                    &record.status_text,
                    &record.unique_transaction_id,
                    &record.vessel_code,
                ],
            )
            .await?;

        tracing::debug!(
            transaction_id = %record.unique_transaction_id,
            "Ledger row upserted"
        );
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgreSQLAdapter {
    async fn purge_expired(&self) -> Result<u64> {
        let removed = self
            .client
            .execute("DELETE FROM batch_review_sessions WHERE expires_at < NOW()", &[])
            .await?;

        if removed > 0 {
            tracing::info!(removed, "Purged expired review sessions");
        }
        Ok(removed)
    }

    async fn insert(
        &self,
        session_id: &str,
        batch_data: &Value,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO batch_review_sessions (session_id, batch_data, expires_at) \
                 VALUES ($1, $2, $3)",
                &[&session_id, batch_data, &expires_at],
            )
            .await?;
        Ok(())
    }

    async fn fetch_active(&self, session_id: &str) -> Result<Option<StoredSession>> {
        let rows = self
            .client
            .query(
                "SELECT session_id, batch_data, created_at, expires_at \
                 FROM batch_review_sessions WHERE session_id = $1 AND expires_at > NOW()",
                &[&session_id],
            )
            .await?;

        rows.first().map(session_from_row).transpose()
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let removed = self
            .client
            .execute(
                "DELETE FROM batch_review_sessions WHERE session_id = $1",
                &[&session_id],
            )
            .await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl SchemaRegistry for PostgreSQLAdapter {
    async fn register(
        &self,
        table_name: &str,
        schema: &Value,
        description: Option<&str>,
    ) -> Result<i32> {
        let rows = self
            .client
            .query(
                r#"
                INSERT INTO schema_versions (table_name, schema_definition, version_number, description)
                SELECT $1, $2, COALESCE(MAX(version_number), 0) + 1, $3
                FROM schema_versions WHERE table_name = $1
                RETURNING version_number
                "#,
                &[&table_name, schema, &description],
            )
            .await?;

        let version: i32 = rows
            .first()
            .map(|row| row.try_get(0))
            .transpose()?
            .unwrap_or(1);

        tracing::info!(table = %table_name, version, "Registered schema version");
        Ok(version)
    }

    async fn current(&self, table_name: &str) -> Result<Option<SchemaVersion>> {
        let rows = self
            .client
            .query(
                "SELECT version_number, schema_definition, created_at, created_by, description \
                 FROM schema_versions WHERE table_name = $1 \
                 ORDER BY version_number DESC LIMIT 1",
                &[&table_name],
            )
            .await?;

        rows.first().map(schema_version_from_row).transpose()
    }

    async fn history(&self, table_name: &str) -> Result<Vec<SchemaVersion>> {
        let rows = self
            .client
            .query(
                "SELECT version_number, schema_definition, created_at, created_by, description \
                 FROM schema_versions WHERE table_name = $1 \
                 ORDER BY version_number DESC",
                &[&table_name],
            )
            .await?;

        rows.iter().map(schema_version_from_row).collect()
    }
}
