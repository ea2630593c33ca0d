use std::path::PathBuf;

use thiserror::Error;

use crate::hex::HexError;

/// Errors returned by the template catalog.
///
/// Every error leaves the in-memory catalog as it was before the call.
///
/// # Examples
/// ```
/// use hexlens_core::CatalogError;
///
/// let err = CatalogError::UnknownTemplate { key: "demo/05".to_string() };
/// assert!(err.to_string().contains("demo/05"));
/// assert!(!err.is_persistence());
/// ```
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    #[error("odd-length hex '{value}': pad with a trailing 0")]
    OddLengthHex { value: String },
    #[error("duplicate name '{name}' in {scope}")]
    DuplicateName { name: String, scope: String },
    #[error("unknown template '{key}'")]
    UnknownTemplate { key: String },
    #[error("key '{key}' matches {count} templates; use <group>/<id>/<name>")]
    AmbiguousKey { key: String, count: usize },
    #[error("no template matches the input")]
    NoMatch,
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown(key: impl Into<String>) -> Self {
        Self::UnknownTemplate { key: key.into() }
    }

    /// Map a strict-hex failure on `value` into the catalog error kinds.
    pub(crate) fn from_hex(value: &str, err: HexError) -> Self {
        match err {
            HexError::OddLength { .. } => Self::OddLengthHex {
                value: value.to_string(),
            },
            HexError::InvalidInput { reason } => Self::InvalidInput {
                reason: format!("'{value}': {reason}"),
            },
        }
    }

    /// True for disk I/O and JSON failures.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Json { .. })
    }
}
