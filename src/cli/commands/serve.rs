//! Serve command implementation
//!
//! Wires the configured adapters into the HTTP API and runs it until a
//! shutdown signal arrives.

use crate::adapters::bakery_ops::{BakeryOpsClient, BakeryOpsGateway};
use crate::adapters::database::{DispatchLedger, SchemaRegistry, SessionStore};
use crate::adapters::jde::{JdeClient, JdeGateway};
use crate::adapters::ldap::{CredentialVerifier, LdapVerifier};
use crate::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
use crate::adapters::s3::{DataLake, S3DataLake};
use crate::auth::{AuthPolicy, TokenService};
use crate::config::{load_config, BakesyncConfig};
use crate::core::archive::DataLakeArchive;
use crate::core::dispatch::Dispatcher;
use crate::core::ingredients::IngredientCatalog;
use crate::core::review::ReviewSessions;
use crate::core::transactions::TransactionSync;
use crate::domain::Result;
use crate::server::{self, AppState};
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override server.host
    #[arg(long)]
    pub host: Option<String>,

    /// Override server.port
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Execute the serve command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Starting serve command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let storage = match connect_storage(&config).await {
            Ok(storage) => storage,
            Err(e) => {
                tracing::error!(error = %e, "PostgreSQL initialization failed");
                eprintln!("Failed to initialize PostgreSQL: {e}");
                return Ok(5);
            }
        };

        let (state, policy) = build_state(&config, storage).await?;
        let app = server::router(state, policy, &config.server.cors_origins);

        let address = config.server.bind_address();
        println!("🚀 Bakesync listening on http://{address}");

        server::serve(app, &address, wait_for_shutdown(shutdown_signal)).await?;

        println!("✅ Server stopped");
        Ok(0)
    }
}

/// Connect, check and migrate the PostgreSQL store
pub(crate) async fn connect_storage(config: &BakesyncConfig) -> Result<Arc<PostgreSQLAdapter>> {
    let client = PostgreSQLClient::new(config.postgresql.clone()).await?;
    client.test_connection().await?;
    client.ensure_schema().await?;

    let pool = client.pool_status();
    tracing::info!(
        max_size = pool.max_size,
        size = pool.size,
        schema = %client.schema(),
        "PostgreSQL pool ready"
    );
    Ok(Arc::new(PostgreSQLAdapter::new(client)))
}

/// Build the handler state and auth policy from configuration
///
/// # Errors
///
/// Returns an error when an HTTP client or the token service cannot be
/// built.
pub async fn build_state(
    config: &BakesyncConfig,
    storage: Arc<PostgreSQLAdapter>,
) -> Result<(AppState, AuthPolicy)> {
    let jde: Arc<dyn JdeGateway> = Arc::new(JdeClient::new(config.jde.clone())?);
    let bakery_ops: Arc<dyn BakeryOpsGateway> =
        Arc::new(BakeryOpsClient::new(config.bakery_ops.clone())?);

    let ledger: Arc<dyn DispatchLedger> = storage.clone();
    let sessions: Arc<dyn SessionStore> = storage.clone();
    let schemas: Arc<dyn SchemaRegistry> = storage;

    let archive = if config.data_lake.enabled {
        let lake: Arc<dyn DataLake> = Arc::new(S3DataLake::new(&config.data_lake).await);
        Some(Arc::new(DataLakeArchive::new(lake, config.data_lake.prefix.clone())))
    } else {
        tracing::info!("Data lake archival disabled");
        None
    };

    let tokens = TokenService::from_config(&config.auth)?.map(Arc::new);
    let verifier = config.auth.ldap.clone().map(|ldap| {
        let verifier: Arc<dyn CredentialVerifier> = Arc::new(LdapVerifier::new(ldap));
        verifier
    });
    if verifier.is_none() {
        tracing::warn!("No LDAP directory configured, /token will reject every login");
    }

    let dispatcher = Dispatcher::new(jde.clone(), ledger.clone()).with_archive(archive.clone());
    let ingredients = Arc::new(IngredientCatalog::new(
        bakery_ops.clone(),
        config.bakery_ops.default_vendor_id.clone(),
        config.bakery_ops.product_type_id,
    ));
    let transactions = TransactionSync::new(
        bakery_ops.clone(),
        ingredients.clone(),
        config.bakery_ops.default_vendor_id.clone(),
    )
    .with_archive(archive.clone());

    let state = AppState {
        jde,
        bakery_ops,
        ledger,
        schemas,
        dispatcher: Arc::new(dispatcher),
        sessions: Arc::new(ReviewSessions::new(
            sessions,
            config.review.session_ttl_minutes,
        )),
        ingredients,
        transactions: Arc::new(transactions),
        archive,
        verifier,
        tokens: tokens.clone(),
        business_unit: config.jde.business_unit.clone(),
        gl_category: config.jde.gl_category.clone(),
    };

    if !config.auth.enabled {
        tracing::warn!("Authentication disabled, every route is public");
    }
    let policy = AuthPolicy::from_config(&config.auth, tokens);

    Ok((state, policy))
}

/// Resolves once the shutdown flag flips to true
async fn wait_for_shutdown(mut signal: watch::Receiver<bool>) {
    while !*signal.borrow() {
        if signal.changed().await.is_err() {
            return;
        }
    }
    tracing::info!("Shutdown requested, draining in-flight requests");
}
