//! Textual dump conventions recognised by the normalizer.

/// Per-line offset prefix: hex digits followed by two or more spaces or by a
/// colon and whitespace (`0010:  ..`, `00000010  ..`).
pub const OFFSET_PREFIX_PATTERN: &str = r"^\s*[0-9a-fA-F]+(\s{2,}|:\s+)";

/// `|....|` ASCII gutter printed after the bytes by `hexdump -C` and similar.
pub const GUTTER_PATTERN: &str = r"\|[^|]*\|";

/// Characters that separate byte tokens besides whitespace: list
/// punctuation plus the brackets and quotes of source-code byte literals.
pub const TOKEN_SEPARATORS: &[char] = &[
    ',', ';', ':', '-', '[', ']', '{', '}', '(', ')', '\'', '"', '\\',
];

/// Optional per-token radix prefixes (`0xAA`, and `xAA` left over from `\xAA`).
pub const HEX_PREFIXES: &[&str] = &["0x", "0X", "x", "X"];

/// Hex digits per byte.
pub const DIGITS_PER_BYTE: usize = 2;
