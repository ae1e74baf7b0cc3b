//! JDE orchestrator REST client

use super::{JdeGateway, JdeResponse};
use crate::config::{JdeConfig, RetryConfig};
use crate::domain::{JdeError, Result, SyncError};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;

/// Databrowse form holding cardex rows
pub const CARDEX_FORM: &str = "fs_DATABROWSE_V4111A";

/// Databrowse form holding item master rows
pub const ITEM_MASTER_FORM: &str = "fs_DATABROWSE_V564102A";

/// reqwest-backed [`JdeGateway`]
pub struct JdeClient {
    client: Client,
    config: JdeConfig,
}

impl JdeClient {
    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: JdeConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification disabled for JDE");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to build JDE HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn auth_header_value(&self) -> Result<String> {
        match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) if !username.trim().is_empty() => {
                let credentials = format!("{username}:{}", password.expose_secret().as_ref());
                let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
                Ok(format!("Basic {encoded}"))
            }
            _ => Err(JdeError::NotConfigured.into()),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request
            .header("Content-Type", "application/json")
            .header("Authorization", self.auth_header_value()?))
    }

    async fn fetch_rows(&self, url: &str, params: &[(&str, &str)], form: &str) -> Result<Vec<Value>> {
        let body = retry_request(&self.config.retry, || async {
            let request = self.authorized(self.client.get(url).query(params))?;
            let response = request
                .send()
                .await
                .map_err(|e| JdeError::ConnectionFailed(e.to_string()))?;

            let status = response.status();
            let text = response.text().await.map_err(|e| {
                JdeError::ConnectionFailed(format!("Failed to read response body: {e}"))
            })?;
            if status.is_server_error() {
                return Err(JdeError::Api {
                    status: status.as_u16(),
                    message: text,
                }
                .into());
            }
            Ok((status, text))
        })
        .await;

        let (status, text) = body?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(JdeError::Api {
                status: status.as_u16(),
                message: text,
            }
            .into());
        }

        let document: Value = serde_json::from_str(&text)
            .map_err(|e| JdeError::InvalidResponse(format!("Body is not JSON: {e}")))?;

        extract_rowset(&document, form)
    }
}

/// Pull `ServiceRequest1.{form}.data.gridData.rowset` out of an orchestrator response
pub fn extract_rowset(document: &Value, form: &str) -> Result<Vec<Value>> {
    let service_request = document.get("ServiceRequest1").ok_or_else(|| {
        JdeError::InvalidResponse("Expected 'ServiceRequest1' key".to_string())
    })?;

    let rowset = service_request
        .get(form)
        .ok_or_else(|| JdeError::InvalidResponse(format!("Expected '{form}' key")))?
        .pointer("/data/gridData/rowset")
        .ok_or_else(|| {
            JdeError::InvalidResponse(format!("Missing data.gridData.rowset in '{form}'"))
        })?;

    match rowset {
        Value::Array(rows) => Ok(rows.clone()),
        Value::Null => Ok(Vec::new()),
        _ => Err(JdeError::InvalidResponse("rowset is not an array".to_string()).into()),
    }
}

/// Retry an operation with exponential backoff
///
/// Only connection failures and 5xx answers are retried.
pub(crate) async fn retry_request<F, T, Fut>(retry: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max_attempts = retry.max_retries + 1;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts || !is_transient(&e) {
                    return Err(e);
                }

                let delay_ms = (retry.initial_delay_ms as f64
                    * retry.backoff_multiplier.powi(attempt as i32 - 1))
                    as u64;
                let delay_ms = delay_ms.min(retry.max_delay_ms);

                crate::log_retry_attempt!(attempt, max_attempts, e);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn is_transient(error: &SyncError) -> bool {
    matches!(
        error,
        SyncError::Jde(JdeError::ConnectionFailed(_))
            | SyncError::Jde(JdeError::Api {
                status: 500..=599,
                ..
            })
    )
}

#[async_trait]
impl JdeGateway for JdeClient {
    async fn fetch_cardex(&self, business_unit: &str, r_date: &str) -> Result<Vec<Value>> {
        tracing::info!(bu = %business_unit, r_date = %r_date, "Fetching JDE cardex");
        let rows = self
            .fetch_rows(
                &self.config.cardex_url,
                &[("bu", business_unit), ("rDate", r_date)],
                CARDEX_FORM,
            )
            .await?;
        tracing::debug!(rows = rows.len(), "Cardex rows received");
        Ok(rows)
    }

    async fn fetch_item_master(
        &self,
        business_unit: &str,
        r_date: &str,
        gl_category: &str,
    ) -> Result<Vec<Value>> {
        tracing::info!(
            bu = %business_unit,
            r_date = %r_date,
            gl_cat = %gl_category,
            "Fetching JDE item master"
        );
        self.fetch_rows(
            &self.config.item_master_url,
            &[("bu", business_unit), ("glCat", gl_category), ("rDate", r_date)],
            ITEM_MASTER_FORM,
        )
        .await
    }

    fn dispatch_configured(&self) -> bool {
        self.config.dispatch_configured()
    }

    async fn post_inventory_adjustment(&self, payload: &Value) -> Result<JdeResponse> {
        let url = self
            .config
            .inventory_adjustment_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(JdeError::NotConfigured)?;

        // Single attempt: JDE adjustments are not idempotent.
        let response = self
            .authorized(self.client.post(url).json(payload))?
            .send()
            .await
            .map_err(|e| JdeError::ConnectionFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| JdeError::InvalidResponse(e.to_string()))?;

        Ok(JdeResponse::new(status, body))
    }
}
