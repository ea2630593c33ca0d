use crate::catalog::model::Endian;
use crate::hex::hex_to_bytes;
use crate::hex::layout::DIGITS_PER_BYTE;

use super::error::DecodeError;

/// Span access over a canonical hex stream.
pub struct FieldReader<'a> {
    hex: &'a str,
}

impl<'a> FieldReader<'a> {
    pub fn new(hex: &'a str) -> Self {
        Self { hex }
    }

    pub fn available(&self) -> usize {
        self.hex.len() / DIGITS_PER_BYTE
    }

    /// Hex digits covering the inclusive byte span `start..=end`.
    pub fn slice(&self, start: usize, end: usize) -> Result<&'a str, DecodeError> {
        if start > end {
            return Err(DecodeError::InvertedSpan { start, end });
        }
        let out_of_range = DecodeError::OutOfRange {
            start,
            end,
            available: self.available(),
        };
        let from = start.checked_mul(DIGITS_PER_BYTE).ok_or(out_of_range.clone())?;
        let to = end
            .checked_add(1)
            .and_then(|n| n.checked_mul(DIGITS_PER_BYTE))
            .ok_or(out_of_range.clone())?;
        self.hex.get(from..to).ok_or(out_of_range)
    }

    /// Bytes of the span in most-significant-first order.
    pub fn ordered_bytes(
        &self,
        start: usize,
        end: usize,
        endian: Endian,
    ) -> Result<Vec<u8>, DecodeError> {
        let mut bytes = hex_to_bytes(self.slice(start, end)?)?;
        if endian == Endian::Little {
            bytes.reverse();
        }
        Ok(bytes)
    }
}

/// Require an exact byte width for `base`.
pub fn require_width(bytes: &[u8], base: &'static str, expected: usize) -> Result<(), DecodeError> {
    if bytes.len() != expected {
        return Err(DecodeError::WidthMismatch {
            base,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Fold most-significant-first bytes into an unsigned value.
pub fn be_unsigned(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Two's-complement sign extension of a `width`-byte value.
pub fn sign_extend(raw: u64, width: usize) -> i64 {
    let shift = 64 - (width as u32 * 8);
    ((raw << shift) as i64) >> shift
}
