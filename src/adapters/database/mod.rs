//! Storage abstraction layer
//!
//! Trait seams for the dispatch ledger, review sessions and the schema
//! registry. [`crate::adapters::postgresql`] provides the production
//! implementations.

pub mod traits;

pub use traits::{
    DispatchLedger, DispatchRecord, SchemaRegistry, SchemaVersion, SessionStore, StoredSession,
};
