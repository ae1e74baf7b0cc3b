//! Bakery-ops REST client
//!
//! Every request carries `Authorization: Access-Token {token}`. A 429 or 423
//! answer is retried after the number of seconds found in `metadata.wait`,
//! up to `max_rate_limit_retries` times.

use super::{BakeryOpsGateway, DeleteOutcome};
use crate::config::BakeryOpsConfig;
use crate::domain::{BakeryOpsError, Result, SyncError};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;

const SEARCH_PAGE_SIZE: &str = "200";
const LIST_PAGE_SIZE: &str = "100000";
const BATCH_PAGE_SIZE: &str = "9999";

struct RawResponse {
    status: u16,
    text: String,
}

/// reqwest-backed [`BakeryOpsGateway`]
pub struct BakeryOpsClient {
    client: Client,
    config: BakeryOpsConfig,
}

impl BakeryOpsClient {
    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: BakeryOpsConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification disabled for bakery-ops");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            SyncError::Configuration(format!("Failed to build bakery-ops HTTP client: {e}"))
        })?;

        Ok(Self { client, config })
    }

    fn outlet_url(&self, path: &str) -> String {
        format!(
            "{}/outlets/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.outlet_id,
            path
        )
    }

    fn ingredient_query(size: &'static str) -> Vec<(&'static str, String)> {
        vec![
            ("archived", "false".to_string()),
            ("includeBatches", "true".to_string()),
            ("includeNotes", "true".to_string()),
            ("offset", "0".to_string()),
            ("size", size.to_string()),
            ("sort", "name:1".to_string()),
        ]
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<RawResponse> {
        let mut rate_limited = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url)
                .header("Content-Type", "application/json")
                .header(
                    "Authorization",
                    format!("Access-Token {}", self.config.token.expose_secret().as_ref()),
                );
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| BakeryOpsError::ConnectionFailed(e.to_string()))?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| BakeryOpsError::InvalidResponse(e.to_string()))?;

            if status != 429 && status != 423 {
                return Ok(RawResponse { status, text });
            }

            if rate_limited >= self.config.max_rate_limit_retries {
                return Err(BakeryOpsError::RateLimited(rate_limited).into());
            }
            rate_limited += 1;

            let wait = rate_limit_wait(&text, self.config.default_rate_limit_wait_seconds);
            tracing::warn!(
                status,
                wait_seconds = wait,
                attempt = rate_limited,
                url = %url,
                "Rate limited by bakery-ops"
            );
            tokio::time::sleep(Duration::from_secs(wait)).await;
        }
    }

    /// Decode a 200/201 answer; an empty list counts as no result
    fn decode(raw: RawResponse) -> Result<Option<Value>> {
        match raw.status {
            200 | 201 => {
                if raw.text.trim().is_empty() {
                    return Ok(None);
                }
                let value: Value = serde_json::from_str(&raw.text).map_err(|e| {
                    BakeryOpsError::InvalidResponse(format!("Body is not JSON: {e}"))
                })?;
                match &value {
                    Value::Array(items) if items.is_empty() => Ok(None),
                    _ => Ok(Some(value)),
                }
            }
            400 => Err(BakeryOpsError::BadRequest(bad_request_message(&raw.text)).into()),
            status => Err(BakeryOpsError::Api {
                status,
                message: raw.text,
            }
            .into()),
        }
    }
}

/// Seconds to wait on a rate-limited answer
fn rate_limit_wait(body: &str, default_seconds: u64) -> u64 {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/metadata/wait").and_then(Value::as_f64))
        .filter(|wait| *wait > 0.0)
        .map_or(default_seconds, |wait| wait.ceil() as u64)
}

/// `msg` of a JSON error body, else the raw text
fn bad_request_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("msg").map(|m| m.as_str().map_or_else(|| m.to_string(), str::to_string)))
        .unwrap_or_else(|| body.to_string())
}

fn into_list(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
        None => Vec::new(),
    }
}

#[async_trait]
impl BakeryOpsGateway for BakeryOpsClient {
    async fn fetch_actions(&self, start_date: &str) -> Result<Vec<Value>> {
        let url = self.outlet_url("actions");
        let query = [
            ("actionTypes", "ADDITION".to_string()),
            ("includeOutletContents", "True".to_string()),
            ("offset", "0".to_string()),
            ("size", "1000".to_string()),
            ("sort", "effectiveAt:1".to_string()),
            ("startEffectiveAt", start_date.to_string()),
        ];

        tracing::info!(outlet = %self.config.outlet_id, start_date = %start_date, "Fetching bakery-ops actions");

        match Self::decode(self.send(Method::GET, &url, &query, None).await?)? {
            None => Ok(Vec::new()),
            Some(Value::Array(actions)) => Ok(actions),
            Some(_) => Err(BakeryOpsError::InvalidResponse(
                "Expected a list of items from Bakery-System API".to_string(),
            )
            .into()),
        }
    }

    async fn list_ingredients(&self) -> Result<Vec<Value>> {
        let url = self.outlet_url("ingredients");
        let query = Self::ingredient_query(LIST_PAGE_SIZE);
        let ingredients = into_list(Self::decode(self.send(Method::GET, &url, &query, None).await?)?);
        tracing::debug!(count = ingredients.len(), "Listed bakery-ops ingredients");
        Ok(ingredients)
    }

    async fn search_ingredients(&self, name: &str) -> Result<Vec<Value>> {
        let url = self.outlet_url("ingredients");
        let mut query = Self::ingredient_query(SEARCH_PAGE_SIZE);
        query.push(("q", name.to_string()));
        Ok(into_list(Self::decode(self.send(Method::GET, &url, &query, None).await?)?))
    }

    async fn get_ingredient(&self, id: &str) -> Result<Option<Value>> {
        let url = self.outlet_url(&format!("ingredients/{id}"));
        let raw = self.send(Method::GET, &url, &[], None).await?;
        if raw.status == 404 {
            return Ok(None);
        }
        Self::decode(raw)
    }

    async fn create_ingredient(&self, payload: &Value) -> Result<Option<Value>> {
        let url = self.outlet_url("ingredients");
        Self::decode(self.send(Method::POST, &url, &[], Some(payload)).await?)
    }

    async fn update_ingredient(&self, id: &str, payload: &Value) -> Result<Option<Value>> {
        let url = self.outlet_url(&format!("ingredients/{id}"));
        Self::decode(self.send(Method::PUT, &url, &[], Some(payload)).await?)
    }

    async fn delete_ingredient(&self, id: &str) -> Result<DeleteOutcome> {
        let url = self.outlet_url(&format!("ingredients/{id}"));
        let raw = self.send(Method::DELETE, &url, &[], None).await?;
        Ok(DeleteOutcome {
            status: raw.status,
            body: raw.text,
        })
    }

    async fn list_batches(&self, ingredient_id: &str) -> Result<Vec<Value>> {
        let url = self.outlet_url(&format!("ingredients/{ingredient_id}/batches"));
        let query = [
            ("archived", "false".to_string()),
            ("depleted", "false".to_string()),
            ("includeDefaultVendor", "true".to_string()),
            ("includeNotes", "true".to_string()),
            ("size", BATCH_PAGE_SIZE.to_string()),
        ];
        Ok(into_list(Self::decode(self.send(Method::GET, &url, &query, None).await?)?))
    }

    async fn create_batch(&self, ingredient_id: &str, payload: &Value) -> Result<Option<Value>> {
        let url = self.outlet_url(&format!("ingredients/{ingredient_id}/batches"));
        Self::decode(self.send(Method::POST, &url, &[], Some(payload)).await?)
    }

    async fn list_batch_actions(&self, ingredient_id: &str, batch_id: &str) -> Result<Vec<Value>> {
        let url = self.outlet_url(&format!(
            "ingredients/{ingredient_id}/batches/{batch_id}/actions"
        ));
        Ok(into_list(Self::decode(self.send(Method::GET, &url, &[], None).await?)?))
    }

    async fn post_action(&self, payload: &Value) -> Result<Option<Value>> {
        let url = self.outlet_url("actions");
        tracing::debug!(outlet = %self.config.outlet_id, "Posting bakery-ops action");
        Self::decode(self.send(Method::POST, &url, &[], Some(payload)).await?)
    }
}
