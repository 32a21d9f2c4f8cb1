//! Error handling for the netdiag engine
//!
//! Internal fallible helpers use [`DiagError`]; public operations convert
//! every failure into a failed [`crate::ActionResult`] at the component
//! boundary instead of letting errors cross it.

use thiserror::Error;

/// Main error type for diagnostic operations
#[derive(Debug, Error)]
pub enum DiagError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for diagnostic operations
pub type DiagResult<T> = Result<T, DiagError>;
