//! Error type shared by every MVP tree operation.

use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

use crate::core::config::TreeConfig;

/// Main error type for MVP tree operations.
///
/// Every engine operation returns `Result<T, MvpTreeError>`. Deleting an absent
/// record is not an error; it is reported as `false` by the removal methods.
#[derive(Debug, Error)]
pub enum MvpTreeError {
    /// A configuration value, query parameter or input record was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The distance metric returned a negative value or NaN.
    #[error("Distance metric returned an invalid value: {value}")]
    InvalidDistance { value: f32 },

    /// A memory reservation failed.
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or truncated persisted tree.
    #[error("Format error at offset {offset} ({field}): {detail}")]
    Format {
        offset: u64,
        field: &'static str,
        detail: String,
    },

    #[error("Unsupported format version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The persisted configuration differs from the one the caller required.
    #[error("Configuration mismatch: expected {expected}, found {found}")]
    ConfigMismatch {
        expected: TreeConfig,
        found: TreeConfig,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl MvpTreeError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn format(offset: u64, field: &'static str, detail: impl Into<String>) -> Self {
        Self::Format { offset, field, detail: detail.into() }
    }
}

impl From<TryReserveError> for MvpTreeError {
    fn from(err: TryReserveError) -> Self {
        Self::AllocationFailure(err.to_string())
    }
}

impl From<toml::de::Error> for MvpTreeError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MvpTreeError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MvpTreeError>;
