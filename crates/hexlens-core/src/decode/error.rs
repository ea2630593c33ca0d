use thiserror::Error;

use crate::hex::HexError;

/// Errors returned while decoding a single field.
///
/// Each variant is a per-field failure: catalog parsing logs it and omits
/// the field while the remaining fields are still decoded.
///
/// # Examples
/// ```
/// use hexlens_core::DecodeError;
///
/// let err = DecodeError::OutOfRange { start: 4, end: 7, available: 6 };
/// assert!(err.to_string().contains("exceeds input"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("span {start}..={end} is inverted")]
    InvertedSpan { start: usize, end: usize },
    #[error("span {start}..={end} exceeds input of {available} bytes")]
    OutOfRange {
        start: usize,
        end: usize,
        available: usize,
    },
    #[error("{base} needs {expected} bytes, got {actual}")]
    WidthMismatch {
        base: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: u16, month: u8, day: u8 },
    #[error("timestamp {seconds} cannot be formatted: {message}")]
    InvalidTimestamp { seconds: u32, message: String },
    #[error("span holds invalid hex: {0}")]
    Hex(#[from] HexError),
}
