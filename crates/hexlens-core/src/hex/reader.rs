use super::error::HexError;
use super::layout;

/// Drop a leading `0x`/`0X` (or the `x` of an escaped `\xAA`) from a token.
pub fn strip_hex_prefix(token: &str) -> &str {
    layout::HEX_PREFIXES
        .iter()
        .find_map(|prefix| token.strip_prefix(prefix))
        .unwrap_or(token)
}

/// True when the token is non-empty and made only of hex digits.
pub fn is_hex_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Append every complete digit pair of `token` to `out`, uppercased.
///
/// A trailing unpaired digit is dropped.
pub fn push_pairs(token: &str, out: &mut String) {
    let usable = token.len() - token.len() % layout::DIGITS_PER_BYTE;
    out.extend(token[..usable].chars().map(|c| c.to_ascii_uppercase()));
}

/// Byte `index` of a canonical hex string, as its two-digit form.
pub fn byte_at(hex: &str, index: usize) -> Option<&str> {
    let start = index.checked_mul(layout::DIGITS_PER_BYTE)?;
    hex.get(start..start + layout::DIGITS_PER_BYTE)
}

/// Number of complete bytes in a canonical hex string.
pub fn byte_len(hex: &str) -> usize {
    hex.len() / layout::DIGITS_PER_BYTE
}

/// Render canonical hex as space-separated byte pairs.
///
/// # Examples
/// ```
/// use hexlens_core::hex_to_spaced;
///
/// assert_eq!(hex_to_spaced("AA0005"), "AA 00 05");
/// assert_eq!(hex_to_spaced(""), "");
/// ```
pub fn hex_to_spaced(hex: &str) -> String {
    let mut out = String::with_capacity(hex.len() + hex.len() / 2);
    let mut index = 0;
    while let Some(pair) = byte_at(hex, index) {
        if index > 0 {
            out.push(' ');
        }
        out.push_str(pair);
        index += 1;
    }
    out
}

/// Convert canonical (or lowercase) hex into raw bytes.
///
/// # Errors
/// Returns `HexError::OddLength` for an odd digit count and
/// `HexError::InvalidInput` when a non-hex character is present.
///
/// # Examples
/// ```
/// use hexlens_core::hex_to_bytes;
///
/// assert_eq!(hex_to_bytes("0102ff").unwrap(), vec![0x01, 0x02, 0xff]);
/// assert!(hex_to_bytes("012").is_err());
/// ```
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, HexError> {
    if hex.len() % layout::DIGITS_PER_BYTE != 0 {
        return Err(HexError::OddLength { len: hex.len() });
    }
    if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(HexError::InvalidInput {
            reason: format!("unexpected character {bad:?}"),
        });
    }
    (0..hex.len())
        .step_by(layout::DIGITS_PER_BYTE)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + layout::DIGITS_PER_BYTE], 16).map_err(|e| {
                HexError::InvalidInput {
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

/// Convert raw bytes into canonical uppercase hex.
///
/// # Examples
/// ```
/// use hexlens_core::bytes_to_hex;
///
/// assert_eq!(bytes_to_hex(&[0xde, 0xad, 0x01]), "DEAD01");
/// ```
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_prefix_handles_both_cases() {
        assert_eq!(strip_hex_prefix("0x41"), "41");
        assert_eq!(strip_hex_prefix("0XFF"), "FF");
        assert_eq!(strip_hex_prefix("41"), "41");
        assert_eq!(strip_hex_prefix("xaa"), "aa");
    }

    #[test]
    fn push_pairs_drops_trailing_nibble() {
        let mut out = String::new();
        push_pairs("abc", &mut out);
        assert_eq!(out, "AB");
    }

    #[test]
    fn byte_at_reads_pairs() {
        assert_eq!(byte_at("AA0005", 2), Some("05"));
        assert_eq!(byte_at("AA0005", 3), None);
        assert_eq!(byte_len("AA0005"), 3);
    }

    #[test]
    fn hex_to_bytes_rejects_non_hex() {
        let err = hex_to_bytes("0G").unwrap_err();
        assert!(matches!(err, HexError::InvalidInput { .. }));
    }

    #[test]
    fn bytes_round_trip_through_hex() {
        let bytes = vec![0x00, 0x7f, 0x80, 0xff];
        assert_eq!(hex_to_bytes(&bytes_to_hex(&bytes)).unwrap(), bytes);
    }
}
