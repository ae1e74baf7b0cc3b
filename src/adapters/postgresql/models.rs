//! Row mappings for the Bakesync tables

use crate::adapters::database::traits::{SchemaVersion, StoredSession};
use crate::domain::{Result, SyncError};
use tokio_postgres::Row;

/// `batch_review_sessions` row
pub fn session_from_row(row: &Row) -> Result<StoredSession> {
    Ok(StoredSession {
        session_id: row.try_get("session_id").map_err(column_error)?,
        batch_data: row.try_get("batch_data").map_err(column_error)?,
        created_at: row.try_get("created_at").map_err(column_error)?,
        expires_at: row.try_get("expires_at").map_err(column_error)?,
    })
}

/// `schema_versions` row
pub fn schema_version_from_row(row: &Row) -> Result<SchemaVersion> {
    Ok(SchemaVersion {
        version: row.try_get("version_number").map_err(column_error)?,
        schema: row.try_get("schema_definition").map_err(column_error)?,
        created_at: row.try_get("created_at").map_err(column_error)?,
        created_by: row.try_get("created_by").map_err(column_error)?,
        description: row.try_get("description").map_err(column_error)?,
    })
}

fn column_error(e: tokio_postgres::Error) -> SyncError {
    SyncError::Database(format!("Unexpected column value: {e}"))
}
