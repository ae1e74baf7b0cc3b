//! PostgreSQL storage
//!
//! Holds the dispatch ledger (`ingredient_submitted_status`), review
//! sessions (`batch_review_sessions`) and the schema registry
//! (`schema_versions`).

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
