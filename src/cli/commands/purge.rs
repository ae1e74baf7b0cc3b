//! Purge-sessions command implementation

use super::serve::connect_storage;
use crate::config::load_config;
use crate::core::review::ReviewSessions;
use clap::Args;

/// Arguments for the purge-sessions command
#[derive(Args, Debug)]
pub struct PurgeArgs {}

impl PurgeArgs {
    /// Execute the purge-sessions command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let store = match connect_storage(&config).await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "PostgreSQL initialization failed");
                eprintln!("Failed to initialize PostgreSQL: {e}");
                return Ok(5);
            }
        };

        let sessions = ReviewSessions::new(store, config.review.session_ttl_minutes);
        let removed = sessions.purge_expired().await?;

        println!("🧹 Removed {removed} expired review session(s)");
        Ok(0)
    }
}
