//! Core business logic for Bakesync.
//!
//! Everything here works against the adapter traits, never against concrete
//! clients, so each flow can be exercised with in-memory fakes.
//!
//! # Modules
//!
//! - [`units`] - JDE ⇄ bakery-ops unit mapping and quantity conversion
//! - [`payload`] - batch → JDE inventory adjustment payload
//! - [`dispatch`] - submission to JDE and ledger bookkeeping
//! - [`actions`] - bakery-ops ADDITION actions flattened into batch records
//! - [`review`] - short-lived review sessions
//! - [`ingredients`] - ingredient search, creation and patching
//! - [`transactions`] - JDE cardex rows posted as bakery-ops batch receipts
//! - [`compare`] - JDE vs bakery-ops comparison views
//! - [`schema`] - schema inference and DDL generation
//! - [`archive`] - data lake archive of dispatches and schemas
//!
//! # Dispatch Workflow
//!
//! 1. **List**: flatten recent ADDITION actions, flagging ledger hits
//! 2. **Prepare**: validate a batch and build its JDE payload for review
//! 3. **Stage** (optional): keep the selection in a review session
//! 4. **Dispatch**: re-check the ledger, post to JDE, mark `done`
//! 5. **Archive**: copy accepted dispatches to the data lake
//!
//! # Example
//!
//! ```rust,no_run
//! use bakesync::adapters::database::DispatchLedger;
//! use bakesync::core::payload::prepare_jde_payload;
//!
//! # async fn example(ledger: &dyn DispatchLedger) -> bakesync::domain::Result<()> {
//! let batch = serde_json::json!({
//!     "action_id": "9001",
//!     "ingredient_id": "42",
//!     "ingredient_name": "B_FLOUR",
//!     "batch_id": "7",
//!     "batch_number": "B_FLOUR_LOT1",
//!     "quantity": 12.5,
//!     "unit": "kg"
//! });
//! let today = chrono::Utc::now().date_naive();
//! let prepared = prepare_jde_payload(&batch, ledger, today).await?;
//! println!("{}", prepared.jde_payload);
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod archive;
pub mod compare;
pub mod dispatch;
pub mod ingredients;
pub mod payload;
pub mod review;
pub mod schema;
pub mod transactions;
pub mod units;
