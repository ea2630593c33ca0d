//! String decoding for `ascii`, `utf8`, `char` and `string` fields.

use encoding_rs::GBK;

/// ASCII decode; bytes above 0x7F become U+FFFD.
pub fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

/// Printable ASCII glyphs, `.` for everything else.
pub fn ascii_glyphs(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '.' })
        .collect()
}

pub fn utf8_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// GB2312 decode (via its GBK superset) with replacement on error.
pub fn gb2312_lossy(bytes: &[u8]) -> String {
    GBK.decode_without_bom_handling(bytes).0.into_owned()
}

pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Auto-detect: pure ASCII, then UTF-8, then GB2312, then Latin-1.
///
/// Trailing NUL padding is ignored. A candidate that is mostly
/// non-printable is skipped; `None` means every candidate was rejected and
/// the caller should fall back to the raw hex form.
pub fn auto_detect(bytes: &[u8]) -> Option<String> {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let bytes = &bytes[..end];
    if bytes.is_empty() {
        return Some(String::new());
    }

    if bytes.is_ascii() {
        let text = ascii_lossy(bytes);
        if mostly_printable(&text) {
            return Some(text);
        }
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        if mostly_printable(text) {
            return Some(text.to_string());
        }
    }
    if let Some(text) = GBK.decode_without_bom_handling_and_without_replacement(bytes) {
        if mostly_printable(&text) {
            return Some(text.into_owned());
        }
    }
    let text = latin1(bytes);
    if mostly_printable(&text) {
        return Some(text);
    }
    None
}

fn mostly_printable(text: &str) -> bool {
    let mut total = 0usize;
    let mut unprintable = 0usize;
    for c in text.chars() {
        total += 1;
        let control = c.is_control() && !matches!(c, '\t' | '\n' | '\r');
        if control || c == char::REPLACEMENT_CHARACTER {
            unprintable += 1;
        }
    }
    unprintable * 2 <= total
}
