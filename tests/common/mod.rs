//! In-memory adapters and an app builder for router tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bakesync::adapters::bakery_ops::{BakeryOpsGateway, DeleteOutcome};
use bakesync::adapters::database::{
    DispatchLedger, DispatchRecord, SchemaRegistry, SchemaVersion, SessionStore, StoredSession,
};
use bakesync::adapters::jde::{JdeGateway, JdeResponse};
use bakesync::adapters::ldap::{AuthenticatedUser, CredentialVerifier};
use bakesync::adapters::s3::{DataLake, ObjectSummary};
use bakesync::auth::{AuthPolicy, TokenService};
use bakesync::core::archive::DataLakeArchive;
use bakesync::core::dispatch::Dispatcher;
use bakesync::core::ingredients::IngredientCatalog;
use bakesync::core::review::ReviewSessions;
use bakesync::core::transactions::TransactionSync;
use bakesync::domain::{Result, SyncError};
use bakesync::server::{router, AppState};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const SIGNING_KEY: &str = "test-signing-key";

pub struct FakeJde {
    pub configured: bool,
    pub cardex: Vec<Value>,
    pub item_master: Vec<Value>,
    /// Status and body returned for adjustments
    pub response: (u16, String),
    pub posted: Mutex<Vec<Value>>,
}

impl Default for FakeJde {
    fn default() -> Self {
        Self {
            configured: true,
            cardex: Vec::new(),
            item_master: Vec::new(),
            response: (200, r#"{"jde__status": "SUCCESS"}"#.to_string()),
            posted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl JdeGateway for FakeJde {
    async fn fetch_cardex(&self, _business_unit: &str, _r_date: &str) -> Result<Vec<Value>> {
        Ok(self.cardex.clone())
    }

    async fn fetch_item_master(
        &self,
        _business_unit: &str,
        _r_date: &str,
        _gl_category: &str,
    ) -> Result<Vec<Value>> {
        Ok(self.item_master.clone())
    }

    fn dispatch_configured(&self) -> bool {
        self.configured
    }

    async fn post_inventory_adjustment(&self, payload: &Value) -> Result<JdeResponse> {
        self.posted.lock().unwrap().push(payload.clone());
        Ok(JdeResponse::new(self.response.0, self.response.1.clone()))
    }
}

#[derive(Default)]
pub struct FakeBakery {
    pub actions: Vec<Value>,
    pub ingredients: Vec<Value>,
    pub batches: Vec<Value>,
    /// Actions already recorded on every batch
    pub batch_actions: Vec<Value>,
    pub deleted: Mutex<Vec<String>>,
    pub updated: Mutex<Vec<(String, Value)>>,
    pub created_batches: Mutex<Vec<Value>>,
    pub posted_actions: Mutex<Vec<Value>>,
}

#[async_trait]
impl BakeryOpsGateway for FakeBakery {
    async fn fetch_actions(&self, _start_date: &str) -> Result<Vec<Value>> {
        Ok(self.actions.clone())
    }

    async fn list_ingredients(&self) -> Result<Vec<Value>> {
        Ok(self.ingredients.clone())
    }

    async fn search_ingredients(&self, name: &str) -> Result<Vec<Value>> {
        let needle = name.to_lowercase();
        Ok(self
            .ingredients
            .iter()
            .filter(|i| {
                i.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn get_ingredient(&self, id: &str) -> Result<Option<Value>> {
        Ok(self
            .ingredients
            .iter()
            .find(|i| i.get("_id").and_then(Value::as_str) == Some(id))
            .cloned())
    }

    async fn create_ingredient(&self, payload: &Value) -> Result<Option<Value>> {
        let mut created = payload.clone();
        created["_id"] = Value::String("new-1".to_string());
        Ok(Some(created))
    }

    async fn update_ingredient(&self, id: &str, payload: &Value) -> Result<Option<Value>> {
        self.updated
            .lock()
            .unwrap()
            .push((id.to_string(), payload.clone()));
        Ok(Some(payload.clone()))
    }

    async fn delete_ingredient(&self, id: &str) -> Result<DeleteOutcome> {
        self.deleted.lock().unwrap().push(id.to_string());
        let status = if self.get_ingredient(id).await?.is_some() {
            204
        } else {
            404
        };
        Ok(DeleteOutcome {
            status,
            body: String::new(),
        })
    }

    async fn list_batches(&self, _ingredient_id: &str) -> Result<Vec<Value>> {
        Ok(self.batches.clone())
    }

    async fn create_batch(&self, _ingredient_id: &str, payload: &Value) -> Result<Option<Value>> {
        self.created_batches.lock().unwrap().push(payload.clone());
        let mut created = payload.clone();
        created["_id"] = Value::String("batch-1".to_string());
        Ok(Some(created))
    }

    async fn list_batch_actions(&self, _ingredient_id: &str, _batch_id: &str) -> Result<Vec<Value>> {
        Ok(self.batch_actions.clone())
    }

    async fn post_action(&self, payload: &Value) -> Result<Option<Value>> {
        self.posted_actions.lock().unwrap().push(payload.clone());
        Ok(Some(serde_json::json!({"_id": "receipt-1", "actionType": payload["actionType"]})))
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    pub done: Mutex<HashSet<String>>,
    pub records: Mutex<Vec<DispatchRecord>>,
}

impl MemoryLedger {
    pub fn with_done(ids: &[&str]) -> Self {
        let ledger = Self::default();
        ledger
            .done
            .lock()
            .unwrap()
            .extend(ids.iter().map(|id| id.to_string()));
        ledger
    }
}

#[async_trait]
impl DispatchLedger for MemoryLedger {
    async fn is_dispatched(&self, unique_transaction_id: &str) -> Result<bool> {
        Ok(self.done.lock().unwrap().contains(unique_transaction_id))
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

#[derive(Default)]
pub struct MemorySessions {
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl MemorySessions {
    /// A store holding one session that expired a minute ago
    pub fn with_expired(session_id: &str, batch_data: Value) -> Self {
        let store = Self::default();
        let created_at = Utc::now() - chrono::Duration::minutes(61);
        store.sessions.lock().unwrap().insert(
            session_id.to_string(),
            StoredSession {
                session_id: session_id.to_string(),
                batch_data,
                created_at,
                expires_at: Utc::now() - chrono::Duration::minutes(1),
            },
        );
        store
    }
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }

    async fn insert(
        &self,
        session_id: &str,
        batch_data: &Value,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.sessions.lock().unwrap().insert(
            session_id.to_string(),
            StoredSession {
                session_id: session_id.to_string(),
                batch_data: batch_data.clone(),
                created_at: Utc::now(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn fetch_active(&self, session_id: &str) -> Result<Option<StoredSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .filter(|s| s.expires_at > Utc::now())
            .cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.lock().unwrap().remove(session_id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    versions: Mutex<HashMap<String, Vec<SchemaVersion>>>,
}

#[async_trait]
impl SchemaRegistry for MemoryRegistry {
    async fn register(
        &self,
        table_name: &str,
        schema: &Value,
        description: Option<&str>,
    ) -> Result<i32> {
        let mut versions = self.versions.lock().unwrap();
        let history = versions.entry(table_name.to_string()).or_default();
        let version = history.len() as i32 + 1;
        history.push(SchemaVersion {
            version,
            schema: schema.clone(),
            created_at: Utc::now(),
            created_by: "system".to_string(),
            description: description.map(str::to_string),
        });
        Ok(version)
    }

    async fn current(&self, table_name: &str) -> Result<Option<SchemaVersion>> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .get(table_name)
            .and_then(|h| h.last().cloned()))
    }

    async fn history(&self, table_name: &str) -> Result<Vec<SchemaVersion>> {
        let mut history = self
            .versions
            .lock()
            .unwrap()
            .get(table_name)
            .cloned()
            .unwrap_or_default();
        history.reverse();
        Ok(history)
    }
}

#[derive(Default)]
pub struct MemoryLake {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl DataLake for MemoryLake {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.objects.lock().unwrap().push((key.to_string(), body));
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, body)| body.clone()))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(key, body)| ObjectSummary {
                key: key.clone(),
                size: body.len() as i64,
                last_modified: Some(Utc::now()),
            })
            .collect())
    }
}

/// Accepts exactly one username/password pair
pub struct StaticVerifier;

#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<AuthenticatedUser> {
        if username == "baker" && password == "rye" {
            Ok(AuthenticatedUser {
                username: username.to_string(),
                roles: vec!["Admin".to_string()],
            })
        } else {
            Err(SyncError::Authentication("Bind failed".to_string()))
        }
    }
}

/// Builder for a router over in-memory adapters
pub struct TestApp {
    pub jde: FakeJde,
    pub bakery: FakeBakery,
    pub ledger: MemoryLedger,
    pub sessions: MemorySessions,
    pub auth: bool,
    pub data_lake: bool,
}

impl Default for TestApp {
    fn default() -> Self {
        Self {
            jde: FakeJde::default(),
            bakery: FakeBakery::default(),
            ledger: MemoryLedger::default(),
            sessions: MemorySessions::default(),
            auth: false,
            data_lake: false,
        }
    }
}

pub struct Built {
    pub router: Router,
    pub tokens: Arc<TokenService>,
    pub jde: Arc<FakeJde>,
    pub bakery: Arc<FakeBakery>,
    pub ledger: Arc<MemoryLedger>,
}

impl TestApp {
    pub fn build(self) -> Built {
        let jde = Arc::new(self.jde);
        let bakery = Arc::new(self.bakery);
        let ledger = Arc::new(self.ledger);
        let tokens = Arc::new(TokenService::new(SIGNING_KEY, "HS256", 30).unwrap());

        let archive = self
            .data_lake
            .then(|| Arc::new(DataLakeArchive::new(Arc::new(MemoryLake::default()), "lake")));

        let dispatcher = Dispatcher::new(jde.clone(), ledger.clone()).with_archive(archive.clone());
        let ingredients = Arc::new(IngredientCatalog::new(bakery.clone(), "67597", 11));
        let transactions = TransactionSync::new(bakery.clone(), ingredients.clone(), "67597")
            .with_archive(archive.clone());

        let state = AppState {
            jde: jde.clone(),
            bakery_ops: bakery.clone(),
            ledger: ledger.clone(),
            schemas: Arc::new(MemoryRegistry::default()),
            dispatcher: Arc::new(dispatcher),
            sessions: Arc::new(ReviewSessions::new(Arc::new(self.sessions), 60)),
            ingredients,
            transactions: Arc::new(transactions),
            archive,
            verifier: Some(Arc::new(StaticVerifier)),
            tokens: Some(tokens.clone()),
            business_unit: "1110".to_string(),
            gl_category: "WA01".to_string(),
        };

        let policy = if self.auth {
            AuthPolicy::new(
                Some(tokens.clone()),
                vec!["/token".to_string(), "/health".to_string()],
                Vec::new(),
            )
        } else {
            AuthPolicy::disabled()
        };

        Built {
            router: router(state, policy, &["*".to_string()]),
            tokens,
            jde,
            bakery,
            ledger,
        }
    }
}

/// Send one request and decode the JSON answer
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
