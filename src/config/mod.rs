//! Configuration management for Bakesync.
//!
//! Bakesync reads a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `BAKESYNC_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Per-section validation
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - log level
//! - [`ServerConfig`] - HTTP listener and CORS
//! - [`JdeConfig`] - JDE orchestrator endpoints, credentials and retries
//! - [`BakeryOpsConfig`] - bakery-ops API, outlet and rate-limit handling
//! - [`PostgreSQLConfig`] - ledger, review sessions and schema registry
//! - [`DataLakeConfig`] - S3 archival
//! - [`AuthConfig`] / [`LdapConfig`] - bearer tokens and directory login
//! - [`ReviewConfig`] - review session lifetime
//! - [`LoggingConfig`] - file logging
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [jde]
//! cardex_url = "https://jde.example.com/jderest/orchestrator/ORCH_CARDEX"
//! item_master_url = "https://jde.example.com/jderest/orchestrator/ORCH_ITEMS"
//! inventory_adjustment_url = "https://jde.example.com/jderest/orchestrator/ORCH_IA"
//! username = "svc_bakesync"
//! password = "${JDE_PASSWORD}"
//!
//! [bakery_ops]
//! base_url = "https://api.bakery-ops.example/v1"
//! outlet_id = "204"
//! token = "${BAKERY_OPS_TOKEN}"
//!
//! [postgresql]
//! connection_string = "${PG_DATABASE_URL}"
//!
//! [auth]
//! secret_key = "${BAKESYNC_SECRET_KEY}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, AuthConfig, BakeryOpsConfig, BakesyncConfig, DataLakeConfig,
    Environment, JdeConfig, LdapConfig, LoggingConfig, PostgreSQLConfig, RetryConfig,
    ReviewConfig, ServerConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
