//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Bakesync configuration file.

use crate::config::{load_config, BakesyncConfig};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        match config.validate() {
            Ok(()) => {
                println!("✅ Configuration is valid");
                println!();
                print_summary(&config);
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }
}

fn print_summary(config: &BakesyncConfig) {
    use secrecy::ExposeSecret;

    println!("Configuration Summary:");
    println!("  Environment: {:?}", config.environment);
    println!("  Log Level: {}", config.application.log_level);
    println!("  Listen Address: {}", config.server.bind_address());
    println!("  CORS Origins: {:?}", config.server.cors_origins);
    println!("  JDE Cardex: {}", config.jde.cardex_url);
    println!("  JDE Business Unit: {}", config.jde.business_unit);
    println!(
        "  JDE Dispatch: {}",
        if config.jde.dispatch_configured() {
            "configured"
        } else {
            "not configured"
        }
    );
    println!("  Bakery-Ops API: {}", config.bakery_ops.base_url);
    println!("  Bakery-Ops Outlet: {}", config.bakery_ops.outlet_id);
    println!(
        "  PostgreSQL: {}",
        config
            .postgresql
            .connection_string
            .expose_secret()
            .as_ref()
            .split('@')
            .next_back()
            .unwrap_or("***")
    );
    if config.data_lake.enabled {
        println!(
            "  Data Lake: s3://{}/{}",
            config.data_lake.bucket, config.data_lake.prefix
        );
    } else {
        println!("  Data Lake: disabled");
    }
    println!(
        "  Authentication: {}{}",
        if config.auth.enabled { "enabled" } else { "disabled" },
        if config.auth.ldap.is_some() { " (LDAP)" } else { "" }
    );
    println!(
        "  Review Session TTL: {} minutes",
        config.review.session_ttl_minutes
    );
    println!();
}
