// Bakesync - JDE to Bakery-Ops Synchronization Middleware
// Copyright (c) 2025 Bakesync Contributors
// Licensed under the MIT License

//! # Bakesync - JDE to Bakery-Ops Synchronization
//!
//! Bakesync is an HTTP middleware that moves inventory transactions between
//! a JDE ERP and a bakery operations platform.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Listing** bakery-ops ADDITION actions as dispatchable batch records
//! - **Preparing** JDE inventory adjustment payloads for review
//! - **Dispatching** them to JDE exactly once, tracked in a PostgreSQL ledger
//! - **Comparing** JDE cardex and item master data with bakery-ops stock
//! - **Managing** bakery-ops ingredients created from JDE item master rows
//! - **Archiving** accepted dispatches and inferred schemas to an S3 data lake
//!
//! ## Architecture
//!
//! Bakesync follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`server`] - axum HTTP API
//! - [`auth`] - Bearer token issuance and enforcement
//! - [`core`] - Business logic (payloads, dispatch, review, comparisons)
//! - [`adapters`] - External integrations (JDE, bakery-ops, PostgreSQL, S3, LDAP)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bakesync::adapters::jde::{JdeClient, JdeGateway};
//! use bakesync::config::load_config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("bakesync.toml")?;
//!     let jde = JdeClient::new(config.jde.clone())?;
//!
//!     let rows = jde.fetch_cardex(&config.jde.business_unit, "01/03/2025").await?;
//!     println!("{} cardex rows", rows.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Idempotent Dispatch
//!
//! Every batch maps to a unique transaction id
//! (`{name}_{lot}_{vessel}_{quantity}`). A transaction recorded as `done` in
//! the ledger is never posted to JDE again:
//!
//! ```rust
//! use bakesync::domain::{unique_transaction_id, Quantity};
//!
//! let quantity = Quantity::from_json(&serde_json::json!(12.5)).unwrap();
//! let id = unique_transaction_id("B_FLOUR", "LOT1", "MX01", &quantity);
//! assert_eq!(id, "B_FLOUR_LOT1_MX01_12.5");
//! ```
//!
//! ## Error Handling
//!
//! Bakesync uses [`domain::SyncError`] for all errors; the HTTP layer maps
//! each variant onto a status code.
//!
//! ## Logging
//!
//! Bakesync uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(outlet = "204", "Fetching actions");
//! warn!(transaction_id = "B_FLOUR_LOT1_7_12.5", "Already dispatched");
//! ```

pub mod adapters;
pub mod auth;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
pub mod server;
