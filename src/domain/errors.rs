//! Domain error types
//!
//! This module defines the error hierarchy for Bakesync.
//! Errors are domain-specific and don't expose third-party types; adapters
//! translate HTTP, database and storage failures into these variants.

use thiserror::Error;

/// Main Bakesync error type
///
/// This is the primary error type used throughout the application.
/// The HTTP layer maps each variant onto a status code.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input rejected before any side effect happened
    #[error("{0}")]
    Validation(String),

    /// Requested entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// Transaction already recorded as dispatched
    #[error("Transaction {0} already dispatched")]
    AlreadyDispatched(String),

    /// JDE-related errors
    #[error("JDE error: {0}")]
    Jde(#[from] JdeError),

    /// Bakery-ops related errors
    #[error("Bakery-ops error: {0}")]
    BakeryOps(#[from] BakeryOpsError),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// JDE orchestrator errors
#[derive(Debug, Error)]
pub enum JdeError {
    /// Endpoint or credentials missing from configuration
    #[error("JDE credentials not configured")]
    NotConfigured,

    /// Failed to reach the orchestrator
    #[error("Failed to connect to JDE: {0}")]
    ConnectionFailed(String),

    /// Orchestrator answered with an unexpected document
    #[error("Invalid JDE response: {0}")]
    InvalidResponse(String),

    /// Non-success status returned by the orchestrator
    #[error("JDE API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Bakery-ops API errors
#[derive(Debug, Error)]
pub enum BakeryOpsError {
    /// Failed to reach the API
    #[error("Failed to connect to bakery-ops: {0}")]
    ConnectionFailed(String),

    /// API rejected the request as invalid
    #[error("API Error (400): {0}")]
    BadRequest(String),

    /// Rate limit retries exhausted
    #[error("Rate limit still active after {0} retries")]
    RateLimited(u32),

    /// Non-success status returned by the API
    #[error("Request failed with status code {status}: {message}")]
    Api { status: u16, message: String },

    /// Body could not be decoded
    #[error("Invalid bakery-ops response: {0}")]
    InvalidResponse(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<tokio_postgres::Error> for SyncError {
    fn from(err: tokio_postgres::Error) -> Self {
        SyncError::Database(err.to_string())
    }
}
