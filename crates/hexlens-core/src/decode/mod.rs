//! Field Decoder.
//!
//! A stateless interpreter: given a canonical hex stream and a field
//! descriptor (type, endianness, inclusive byte span) it extracts one typed
//! value. Integers, IEEE floats, booleans, raw hex, strings in several
//! encodings, calendar dates and Unix timestamps are supported.
//!
//! - `layout`: the `base[.sub][.length]` type grammar
//! - `reader`: span slicing and byte ordering
//! - `parser`: `decode_field` dispatch
//! - `text`: string decoders and encoding auto-detection
//! - `error`: per-field failures

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;
pub mod text;

pub use error::DecodeError;
pub use layout::{BaseType, FieldType, TextKind};
pub use parser::decode_field;
