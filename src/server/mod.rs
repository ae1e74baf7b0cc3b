//! HTTP API
//!
//! All routes share one [`AppState`] holding `Arc`ed adapters and the core
//! services built on them. Bearer authentication wraps the whole router;
//! CORS and request tracing sit outside it so preflight requests are
//! answered without a token.

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::adapters::bakery_ops::BakeryOpsGateway;
use crate::adapters::database::{DispatchLedger, SchemaRegistry};
use crate::adapters::jde::JdeGateway;
use crate::adapters::ldap::CredentialVerifier;
use crate::auth::{require_bearer, AuthPolicy, TokenService};
use crate::core::archive::DataLakeArchive;
use crate::core::dispatch::Dispatcher;
use crate::core::ingredients::IngredientCatalog;
use crate::core::review::ReviewSessions;
use crate::core::transactions::TransactionSync;
use crate::domain::{Result, SyncError};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub jde: Arc<dyn JdeGateway>,
    pub bakery_ops: Arc<dyn BakeryOpsGateway>,
    pub ledger: Arc<dyn DispatchLedger>,
    pub schemas: Arc<dyn SchemaRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<ReviewSessions>,
    pub ingredients: Arc<IngredientCatalog>,
    pub transactions: Arc<TransactionSync>,
    /// Present when the data lake is enabled
    pub archive: Option<Arc<DataLakeArchive>>,
    pub verifier: Option<Arc<dyn CredentialVerifier>>,
    pub tokens: Option<Arc<TokenService>>,
    /// Business unit used when a request does not name one
    pub business_unit: String,
    pub gl_category: String,
}

/// Build the router with every endpoint, auth, CORS and tracing
pub fn router(state: AppState, policy: AuthPolicy, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/token", post(handlers::issue_token))
        .route("/units", get(handlers::units))
        // Bakery-ops → JDE
        .route(
            "/data/bakery_system_to_jde_actions",
            get(handlers::batch_actions),
        )
        .route("/prepare_jde_payload", post(handlers::prepare_payload))
        .route(
            "/dispatch/prepared_payload_to_jde",
            post(handlers::dispatch_prepared_payload),
        )
        .route("/dispatch/batch_to_jde", post(handlers::dispatch_batch))
        // Review sessions
        .route("/batch_review/create_session", post(handlers::create_session))
        .route(
            "/batch_review/get_session/:session_id",
            get(handlers::get_session),
        )
        .route(
            "/batch_review/delete_session/:session_id",
            delete(handlers::delete_session),
        )
        // JDE → bakery-ops
        .route("/data/joined_df3", get(handlers::live_data))
        .route("/live-data", get(handlers::live_data))
        .route(
            "/data/jde_item_master_review",
            get(handlers::item_master_review),
        )
        .route("/search/ingredient", get(handlers::search_ingredient))
        .route("/search/Ingredient", get(handlers::search_ingredient))
        .route(
            "/prepare_transaction_payload",
            post(handlers::prepare_transaction),
        )
        .route(
            "/dispatch/prepared_transaction",
            post(handlers::dispatch_prepared_transaction),
        )
        .route("/dispatch/transaction", post(handlers::dispatch_transaction))
        .route(
            "/prepare_ingredient_payload",
            post(handlers::prepare_ingredient),
        )
        .route(
            "/create/prepared_ingredient",
            post(handlers::create_prepared_ingredient),
        )
        .route("/create/ingredient", post(handlers::create_ingredient))
        .route("/create/Ingredient", post(handlers::create_ingredient))
        .route("/patch/ingredient", patch(handlers::patch_ingredient_from_jde))
        .route("/patch/ingredient/advanced", post(handlers::patch_ingredient))
        .route("/delete/ingredient/:ingredient_id", delete(handlers::delete_ingredient))
        .route("/delete/Ingredient/:ingredient_id", delete(handlers::delete_ingredient))
        // Data lake and schema registry
        .route("/s3/dispatches", get(handlers::list_dispatches))
        .route(
            "/s3/schemas/:table_name",
            get(handlers::latest_schema).post(handlers::store_schema),
        )
        .route("/schemas/:table_name", get(handlers::current_schema))
        .route("/schemas/:table_name/history", get(handlers::schema_history))
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            Arc::new(policy),
            require_bearer,
        ))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// CORS for the configured origins; `*` allows any origin without credentials
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Bind `address` and serve until `shutdown` resolves
///
/// # Errors
///
/// Returns [`SyncError::Io`] when the address cannot be bound.
pub async fn serve<F>(app: Router, address: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|e| SyncError::Io(format!("Failed to bind {address}: {e}")))?;

    tracing::info!(address = %address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SyncError::Io(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
