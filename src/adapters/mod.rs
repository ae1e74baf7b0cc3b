//! External system integrations for Bakesync.
//!
//! - [`jde`] - JDE orchestrator (cardex, item master, inventory adjustments)
//! - [`bakery_ops`] - bakery-ops outlet API (actions, ingredients)
//! - [`database`] - storage traits for the ledger, sessions and schema registry
//! - [`postgresql`] - PostgreSQL implementation of the storage traits
//! - [`s3`] - data lake object storage
//! - [`ldap`] - credential verification
//!
//! # Design Pattern
//!
//! Each integration exposes an `async_trait` seam and one production
//! implementation. The core and HTTP layers hold `Arc<dyn Trait>`, so tests
//! substitute in-memory fakes.
//!
//! ```rust,no_run
//! use bakesync::adapters::jde::{JdeClient, JdeGateway};
//! use bakesync::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("bakesync.toml")?;
//! let jde = JdeClient::new(config.jde.clone())?;
//! let rows = jde.fetch_cardex("1110", "01/06/2025").await?;
//! println!("{} cardex rows", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod bakery_ops;
pub mod database;
pub mod jde;
pub mod ldap;
pub mod postgresql;
pub mod s3;
