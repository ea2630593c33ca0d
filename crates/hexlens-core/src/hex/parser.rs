use std::sync::LazyLock;

use regex::Regex;

use super::error::HexError;
use super::layout;
use super::reader::{is_hex_token, push_pairs, strip_hex_prefix};

static OFFSET_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(layout::OFFSET_PREFIX_PATTERN).ok());
static GUTTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(layout::GUTTER_PATTERN).ok());

/// Normalize an arbitrary textual dump into canonical hex.
///
/// Each line loses a recognised offset prefix and any `|....|` gutter; the
/// remaining text is split into tokens on whitespace, list punctuation,
/// brackets and quotes. Sentence-final dots are trimmed, tokens still
/// carrying non-hex characters (labels, unbracketed gutters) are discarded
/// whole, and complete digit pairs are collected from the rest.
/// The result is always even-length and uppercase; pathological input yields
/// the empty string.
///
/// # Examples
/// ```
/// use hexlens_core::normalize;
///
/// let dump = "0000:  AA 00 00 05 00 01 02 03 04  |.........|";
/// assert_eq!(normalize(dump), "AA0000050001020304");
/// assert_eq!(normalize("{0xAA, 0xBB}"), "AABB");
/// assert_eq!(normalize("no bytes here"), "");
/// ```
pub fn normalize(text: &str) -> String {
    let joined = text
        .lines()
        .map(|line| strip_gutters(strip_offset(line)))
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = String::with_capacity(joined.len());
    for token in joined.split(is_separator) {
        let token = strip_hex_prefix(token.trim_end_matches('.'));
        if is_hex_token(token) {
            push_pairs(token, &mut out);
        }
    }
    out
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || layout::TOKEN_SEPARATORS.contains(&c)
}

fn strip_offset(line: &str) -> &str {
    match OFFSET_PREFIX.as_ref().and_then(|re| re.find(line)) {
        Some(prefix) => &line[prefix.end()..],
        None => line,
    }
}

fn strip_gutters(line: &str) -> String {
    match GUTTER.as_ref() {
        Some(re) => re.replace_all(line, " ").into_owned(),
        None => line.to_string(),
    }
}

/// Append a trailing `0` to odd-length hex.
///
/// # Examples
/// ```
/// use hexlens_core::pad_odd;
///
/// assert_eq!(pad_odd("ABC"), "ABC0");
/// assert_eq!(pad_odd("AB"), "AB");
/// ```
pub fn pad_odd(hex: &str) -> String {
    let mut out = hex.to_string();
    if out.len() % layout::DIGITS_PER_BYTE != 0 {
        out.push('0');
    }
    out
}

/// Interpret the whole input as one contiguous hex run.
///
/// Whitespace, `0x` prefixes and token separators are removed; any other
/// non-hex character is rejected. Odd-length input is an error unless `pad`
/// is set, in which case a trailing `0` is appended.
///
/// # Errors
/// `HexError::InvalidInput` for empty or non-hex input, `HexError::OddLength`
/// for an odd digit count without `pad`.
///
/// # Examples
/// ```
/// use hexlens_core::{HexError, parse_strict};
///
/// assert_eq!(parse_strict("0xab, 0xcd", false).unwrap(), "ABCD");
/// assert_eq!(parse_strict("abc", true).unwrap(), "ABC0");
/// assert_eq!(parse_strict("abc", false), Err(HexError::OddLength { len: 3 }));
/// ```
pub fn parse_strict(text: &str, pad: bool) -> Result<String, HexError> {
    let mut digits = String::with_capacity(text.len());
    for token in text.split(is_separator) {
        let token = strip_hex_prefix(token);
        if token.is_empty() {
            continue;
        }
        if !is_hex_token(token) {
            return Err(HexError::InvalidInput {
                reason: format!("'{token}' is not hex"),
            });
        }
        digits.extend(token.chars().map(|c| c.to_ascii_uppercase()));
    }
    if digits.is_empty() {
        return Err(HexError::InvalidInput {
            reason: "no hex digits".to_string(),
        });
    }
    if digits.len() % layout::DIGITS_PER_BYTE != 0 {
        if !pad {
            return Err(HexError::OddLength { len: digits.len() });
        }
        digits.push('0');
    }
    Ok(digits)
}

/// Canonicalise a user-entered hex identifier (`0x05`, `aa`, ` 1f `).
///
/// # Errors
/// `HexError::InvalidInput` for empty or non-hex ids and
/// `HexError::OddLength` for odd digit counts.
///
/// # Examples
/// ```
/// use hexlens_core::canonical_id;
///
/// assert_eq!(canonical_id(" 0xaa ").unwrap(), "AA");
/// assert!(canonical_id("5").is_err());
/// ```
pub fn canonical_id(text: &str) -> Result<String, HexError> {
    let id = strip_hex_prefix(text.trim());
    if id.is_empty() {
        return Err(HexError::InvalidInput {
            reason: "empty hex id".to_string(),
        });
    }
    if !is_hex_token(id) {
        return Err(HexError::InvalidInput {
            reason: format!("'{id}' is not hex"),
        });
    }
    if id.len() % layout::DIGITS_PER_BYTE != 0 {
        return Err(HexError::OddLength { len: id.len() });
    }
    Ok(id.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::reader::hex_to_spaced;

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\n\n"), "");
    }

    #[test]
    fn text_without_pairs_yields_empty_output() {
        assert_eq!(normalize("Frame: no payload captured"), "");
        assert_eq!(normalize("|....| |xyz|"), "");
    }

    #[test]
    fn strips_colon_offset_and_gutter() {
        let out = normalize("0010:  41 42 43 44  |ABCD|");
        assert_eq!(out, "41424344");
    }

    #[test]
    fn strips_hexdump_style_offset() {
        let dump = "00000000  aa 00 00 05 00 01 02 03  |........|\n00000008  04                       |.|";
        assert_eq!(normalize(dump), "AA0000050001020304");
    }

    #[test]
    fn keeps_single_space_offset_line_intact() {
        // no recognised offset: the leading run is scanned like any token
        assert_eq!(normalize("0010 41 42"), "00104142");
    }

    #[test]
    fn uppercases_mixed_case() {
        assert_eq!(normalize("de Ad bE ef"), "DEADBEEF");
    }

    #[test]
    fn stray_nibble_is_discarded() {
        assert_eq!(normalize("ABC"), "AB");
    }

    #[test]
    fn accepts_prefixed_and_comma_separated_bytes() {
        assert_eq!(normalize("0x01, 0x02,0x03"), "010203");
    }

    #[test]
    fn bytes_next_to_punctuation_are_kept() {
        assert_eq!(normalize("{0xAA,0xBB}"), "AABB");
        assert_eq!(normalize("[AA BB CC]"), "AABBCC");
        assert_eq!(normalize("AA BB CC."), "AABBCC");
        assert_eq!(normalize(r"b'\xaa\xbb'"), "AABB");
        assert_eq!(normalize("(0x01; 0x02)"), "0102");
    }

    #[test]
    fn dotted_gutter_without_pipes_is_dropped() {
        assert_eq!(normalize("0000   aa 00 05   ..AB.."), "AA0005");
    }

    #[test]
    fn normalize_is_idempotent_through_spacing() {
        let inputs = [
            "0000:  AA 00 00 05 00 01 02 03 04  |.........|",
            "ab cd ef 0",
            "nonsense 12 zz 3456",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&hex_to_spaced(&once)), once);
        }
    }

    #[test]
    fn strict_rejects_gutter_text() {
        let err = parse_strict("41 42 |AB|", false).unwrap_err();
        assert!(matches!(err, HexError::InvalidInput { .. }));
    }

    #[test]
    fn canonical_id_rejects_garbage() {
        assert!(matches!(
            canonical_id(""),
            Err(HexError::InvalidInput { .. })
        ));
        assert!(matches!(
            canonical_id("zz"),
            Err(HexError::InvalidInput { .. })
        ));
        assert_eq!(canonical_id("0x1f"), Ok("1F".to_string()));
    }
}
