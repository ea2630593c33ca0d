//! Hex Normalizer.
//!
//! Turns heterogeneous textual dumps (Wireshark "copy as hex", `hexdump -C`,
//! bare byte lists, `0x` arrays) into a canonical byte stream: an even-length,
//! uppercase hex string without separators.
//!
//! - `layout`: recognised offset prefix and token separators
//! - `reader`: hex/byte helpers shared by the decoder and catalog
//! - `parser`: `normalize` plus the strict parsers for user-entered hex
//! - `error`: errors for the strict paths (`normalize` itself never fails)

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::HexError;
pub use parser::{canonical_id, normalize, pad_odd, parse_strict};
pub use reader::{bytes_to_hex, hex_to_bytes, hex_to_spaced};
