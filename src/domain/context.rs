//! Error context extension trait
//!
//! Adds `.context()` / `.with_context()` to any result whose error converts
//! into [`SyncError`]. Unlike `anyhow::Context`, the variant of the original
//! error is kept whenever it carries a plain message, so a database failure
//! with context is still reported (and mapped to a status code) as a
//! database failure.
//!
//! ```rust
//! use bakesync::domain::{Result, SyncError};
//! use bakesync::domain::context::ResultExt;
//!
//! fn read_template(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
//! }
//! ```

use crate::domain::errors::SyncError;
use crate::domain::result::Result;
use std::fmt::Display;

pub trait ResultExt<T> {
    /// Prefix the error message with `context`
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Like [`ResultExt::context`], evaluated only on error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SyncError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| wrap(e.into(), context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| wrap(e.into(), f()))
    }
}

fn wrap(err: SyncError, context: impl Display) -> SyncError {
    match err {
        SyncError::Database(msg) => SyncError::Database(format!("{context}: {msg}")),
        SyncError::Storage(msg) => SyncError::Storage(format!("{context}: {msg}")),
        SyncError::Io(msg) => SyncError::Io(format!("{context}: {msg}")),
        SyncError::Serialization(msg) => SyncError::Serialization(format!("{context}: {msg}")),
        SyncError::Configuration(msg) => SyncError::Configuration(format!("{context}: {msg}")),
        other => SyncError::Other(format!("{context}: {other}")),
    }
}
