//! Result type alias for Bakesync

use super::errors::SyncError;

/// Result type alias for Bakesync operations
///
/// # Examples
///
/// ```
/// use bakesync::domain::result::Result;
/// use bakesync::domain::errors::SyncError;
///
/// fn failing_function() -> Result<()> {
///     Err(SyncError::Validation("Invalid input".to_string()))
/// }
///
/// assert!(failing_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, SyncError>;
