//! S3 implementation of [`DataLake`] on `aws-sdk-s3`

use super::{DataLake, ObjectSummary};
use crate::config::DataLakeConfig;
use crate::domain::{Result, SyncError};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Bucket-scoped S3 client
pub struct S3DataLake {
    client: Client,
    bucket: String,
}

impl S3DataLake {
    /// Build a client from the AWS default provider chain
    ///
    /// `region` and `endpoint_url` from the configuration override the
    /// environment; a custom endpoint switches to path-style addressing.
    pub async fn new(config: &DataLakeConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = config.endpoint_url.as_deref() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!(bucket = %config.bucket, "S3 data lake client initialized");

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

fn storage_error<E>(action: &str, key: &str, err: E) -> SyncError
where
    E: std::error::Error,
{
    SyncError::Storage(format!("Failed to {action} {key}: {}", DisplayErrorContext(&err)))
}

#[async_trait]
impl DataLake for S3DataLake {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| storage_error("store", key, e))?;

        tracing::debug!(bucket = %self.bucket, key = %key, "Stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => return Err(storage_error("read", key, e)),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| storage_error("read", key, e))?;
        Ok(Some(bytes.into_bytes().to_vec()))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| storage_error("list", prefix, e))?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(ObjectSummary {
                    key: key.to_string(),
                    size: object.size().unwrap_or_default(),
                    last_modified: object.last_modified().and_then(|ts| {
                        DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
                    }),
                });
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(prefix = %prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }
}
