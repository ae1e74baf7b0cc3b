//! Domain models and types for Bakesync.
//!
//! The domain layer holds everything that is independent of the outside
//! systems:
//! - **Error types** ([`SyncError`], [`JdeError`], [`BakeryOpsError`])
//! - **Result type alias** ([`Result`])
//! - **Quantities** ([`Quantity`]) carrying both a decimal value and the
//!   text received from the caller
//! - **Batch records and requests** ([`BatchRecord`], [`BatchRequest`]) and
//!   the unique transaction id used for idempotent dispatch
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, SyncError>`]:
//!
//! ```rust
//! use bakesync::domain::{BatchRequest, Result};
//!
//! fn key(body: &serde_json::Value) -> Result<String> {
//!     let request = BatchRequest::from_value(body)?;
//!     Ok(request.unique_transaction_id())
//! }
//! ```

pub mod batch;
pub mod context;
pub mod errors;
pub mod quantity;
pub mod result;

// Re-export commonly used types for convenience
pub use batch::{strip_product_prefix, unique_transaction_id, BatchRecord, BatchRequest};
pub use errors::{BakeryOpsError, JdeError, SyncError};
pub use quantity::{preserve_quantity_precision, Quantity};
pub use result::Result;
