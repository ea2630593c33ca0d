use thiserror::Error;

/// Errors returned by strict hex handling.
///
/// `normalize` never fails; these errors come from the helpers that accept
/// user-entered hex (template ids, follow qualifiers, contiguous hex runs).
///
/// # Examples
/// ```
/// use hexlens_core::HexError;
///
/// let err = HexError::OddLength { len: 3 };
/// assert!(err.to_string().contains("odd-length hex"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("invalid hex input: {reason}")]
    InvalidInput { reason: String },
    #[error("odd-length hex ({len} digits): pad with a trailing 0 to continue")]
    OddLength { len: usize },
}
