//! Object storage for the data lake

pub mod client;

pub use client::S3DataLake;

use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Listing entry of a stored object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Minimal object store used by the archive
#[async_trait]
pub trait DataLake: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<()>;

    /// Object contents; `None` when the key does not exist
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Every object under `prefix`, across pages
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>>;
}
