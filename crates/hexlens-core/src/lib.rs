//! hexlens core library: a reverse-engineering aid for binary wire protocols.
//!
//! The crate is made of three engines that share no global state:
//! the hex normalizer turns a pasted dump into a canonical byte stream, the
//! template catalog stores Protocols and their Commands on disk and picks the
//! template matching a stream, and the field decoder extracts typed values
//! from byte spans. Parsing is side-effect free; all I/O lives in
//! `catalog::store` and `session`.
//!
//! Invariants:
//! - Canonical hex is even-length uppercase without separators.
//! - Catalog mutations validate, write, then index; a failed call leaves
//!   memory as it was.
//! - Matching is deterministic: groups are scanned by protocol name.
//!
//! # Examples
//! ```
//! use hexlens_core::{Catalog, Command, Endian, Field, FieldValue, Protocol, Template, normalize};
//!
//! let dir = std::env::temp_dir().join(format!("hexlens-lib-doc-{}", std::process::id()));
//! let mut catalog = Catalog::open(&dir);
//! catalog.save(&Template::Protocol(Protocol::new("TestProto", "AA")))?;
//! let mut ping = Command::new("TestProto", "Ping", "05");
//! ping.header.fields.push(Field::new("seq", "u16", 5, 6, Endian::Big));
//! catalog.save(&Template::Command(ping))?;
//!
//! let hex = normalize("0000:  AA 00 00 05 00 01 02 03 04  |.........|");
//! let (template, record) = catalog.identify(&hex)?;
//! assert_eq!(template.name(), "Ping");
//! assert_eq!(record.fields[0].value, FieldValue::Unsigned(258));
//! # std::fs::remove_dir_all(&dir).ok();
//! # Ok::<(), hexlens_core::CatalogError>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod decode;
pub mod hex;
pub mod session;

pub use catalog::model::{Command, Endian, Field, Protocol, Template, TemplateHeader};
pub use catalog::{Catalog, CatalogError, FieldRef, parse_template};
pub use decode::{DecodeError, decode_field};
pub use hex::{
    HexError, bytes_to_hex, canonical_id, hex_to_bytes, hex_to_spaced, normalize, pad_odd,
    parse_strict,
};
pub use session::{Session, SessionError};

/// A decoded value.
///
/// Serialized untagged so JSON output carries plain numbers, booleans and
/// strings.
///
/// # Examples
/// ```
/// use hexlens_core::FieldValue;
///
/// assert_eq!(FieldValue::Signed(-2).to_string(), "-2");
/// assert_eq!(FieldValue::Float(3.141593).to_string(), "3.141593");
/// assert_eq!(serde_json::to_string(&FieldValue::Unsigned(258)).unwrap(), "258");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// One field decoded from a byte stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedField {
    pub name: String,
    /// Type string as declared on the field.
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: FieldValue,
    /// Uppercase hex of the span.
    pub hex: String,
    /// Inclusive `[start_pos, end_pos]`.
    pub span: [usize; 2],
}

/// Result of parsing a byte stream against one template.
///
/// Fields that failed to decode are absent; the rest keep declared order.
///
/// # Examples
/// ```
/// use hexlens_core::{Endian, Field, Protocol, Template, parse_template};
///
/// let mut proto = Protocol::new("Demo", "AA");
/// proto.header.fields.push(Field::new("len", "u8", 1, 1, Endian::Big));
/// proto.header.fields.push(Field::new("beyond", "u32", 8, 11, Endian::Big));
/// let record = parse_template("AA10", &Template::Protocol(proto));
/// assert_eq!(record.template_id, "AA");
/// assert_eq!(record.fields.len(), 1);
/// assert_eq!(record.fields[0].hex, "10");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub template_name: String,
    pub template_id: String,
    pub fields: Vec<DecodedField>,
}
