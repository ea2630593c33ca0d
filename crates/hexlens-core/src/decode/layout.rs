//! Field type grammar: `base[.sub][.length]`.
//!
//! Integer bases carry their width implicitly; every other base records the
//! declared byte length when saved (`char.ascii.4`, `float.4`, `date.4`).

use std::fmt;

/// Width in bytes of `date` fields (`YYYY MM DD`).
pub const DATE_WIDTH: usize = 4;
/// Width in bytes of `timestamp` fields (Unix seconds).
pub const TIMESTAMP_WIDTH: usize = 4;
/// Decimal places kept for `float`/`double` values.
pub const FLOAT_DECIMALS: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
    Bool,
    Char,
    Ascii,
    Utf8,
    String,
    Hex,
    Bytes,
    Date,
    Timestamp,
}

impl BaseType {
    pub fn parse(text: &str) -> Option<Self> {
        let base = match text {
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "float" => Self::Float,
            "double" => Self::Double,
            "bool" => Self::Bool,
            "char" => Self::Char,
            "ascii" => Self::Ascii,
            "utf8" => Self::Utf8,
            "string" => Self::String,
            "hex" => Self::Hex,
            "bytes" => Self::Bytes,
            "date" => Self::Date,
            "timestamp" => Self::Timestamp,
            _ => return None,
        };
        Some(base)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Ascii => "ascii",
            Self::Utf8 => "utf8",
            Self::String => "string",
            Self::Hex => "hex",
            Self::Bytes => "bytes",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
        }
    }

    /// Exact byte width for fixed-size bases.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::Float => Some(4),
            Self::U64 | Self::I64 | Self::Double => Some(8),
            Self::Date => Some(DATE_WIDTH),
            Self::Timestamp => Some(TIMESTAMP_WIDTH),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }
}

/// Text encoding sub-kind for `char`/`string` bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Ascii,
    Utf8,
    Gb2312,
    Latin1,
}

impl TextKind {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "ascii" => Some(Self::Ascii),
            "utf8" | "utf-8" => Some(Self::Utf8),
            "gb2312" | "gbk" => Some(Self::Gb2312),
            "latin1" | "latin-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Utf8 => "utf8",
            Self::Gb2312 => "gb2312",
            Self::Latin1 => "latin1",
        }
    }
}

/// Parsed field type.
///
/// # Examples
/// ```
/// use hexlens_core::decode::layout::{BaseType, FieldType, TextKind};
///
/// let ty = FieldType::parse("char.ascii.4").unwrap();
/// assert_eq!(ty.base, BaseType::Char);
/// assert_eq!(ty.sub, Some(TextKind::Ascii));
/// assert_eq!(ty.length, Some(4));
/// assert!(FieldType::parse("quaternion").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldType {
    pub base: BaseType,
    pub sub: Option<TextKind>,
    pub length: Option<usize>,
}

impl FieldType {
    pub fn new(base: BaseType) -> Self {
        Self {
            base,
            sub: None,
            length: None,
        }
    }

    /// Parse `base[.sub][.length]`; `None` for unknown or malformed types.
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().to_ascii_lowercase();
        let mut parts = lowered.split('.');
        let base = BaseType::parse(parts.next()?)?;
        let mut ty = Self::new(base);
        for part in parts {
            if let Ok(length) = part.parse::<usize>() {
                if length == 0 || ty.length.is_some() {
                    return None;
                }
                ty.length = Some(length);
            } else if ty.sub.is_none() && ty.length.is_none() {
                ty.sub = Some(TextKind::parse(part)?);
            } else {
                return None;
            }
        }
        Some(ty)
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = if self.base.is_integer() {
            None
        } else {
            Some(length)
        };
        self
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.as_str())?;
        if let Some(sub) = self.sub {
            write!(f, ".{}", sub.as_str())?;
        }
        if let Some(length) = self.length {
            write!(f, ".{length}")?;
        }
        Ok(())
    }
}

/// Stored form of a type string for a field spanning `span_len` bytes.
///
/// Known non-integer bases get the span length appended (or corrected);
/// integer bases drop any length; unknown types are kept verbatim.
///
/// # Examples
/// ```
/// use hexlens_core::decode::layout::saved_type;
///
/// assert_eq!(saved_type("char.ascii", 4), "char.ascii.4");
/// assert_eq!(saved_type("string.2", 6), "string.6");
/// assert_eq!(saved_type("u16", 2), "u16");
/// assert_eq!(saved_type("custom", 3), "custom");
/// ```
pub fn saved_type(text: &str, span_len: usize) -> String {
    match FieldType::parse(text) {
        Some(ty) => ty.with_length(span_len).to_string(),
        None => text.to_string(),
    }
}
