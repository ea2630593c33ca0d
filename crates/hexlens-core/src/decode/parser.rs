use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::catalog::model::{Endian, Field};
use crate::{DecodedField, FieldValue};

use super::error::DecodeError;
use super::layout::{self, BaseType, FieldType, TextKind};
use super::reader::{FieldReader, be_unsigned, require_width, sign_extend};
use super::text;

/// Decode one field from a canonical hex stream.
///
/// Unknown or malformed type strings yield the raw hex slice as a text value.
///
/// # Errors
/// Returns `DecodeError` when the span is inverted or exceeds the input, when
/// a fixed-width base sees a different length, or when a date is invalid.
///
/// # Examples
/// ```
/// use hexlens_core::{Endian, Field, FieldValue, decode_field};
///
/// let field = Field::new("seq", "u16", 5, 6, Endian::Big);
/// let decoded = decode_field("AA0000050001020304", &field).unwrap();
/// assert_eq!(decoded.value, FieldValue::Unsigned(258));
/// assert_eq!(decoded.hex, "0102");
/// ```
pub fn decode_field(hex: &str, field: &Field) -> Result<DecodedField, DecodeError> {
    let reader = FieldReader::new(hex);
    let slice = reader.slice(field.start_pos, field.end_pos)?.to_ascii_uppercase();
    let value = match FieldType::parse(&field.field_type) {
        Some(ty) => decode_value(&reader, field, ty, &slice)?,
        None => FieldValue::Text(slice.clone()),
    };
    Ok(DecodedField {
        name: field.name.clone(),
        field_type: field.field_type.clone(),
        value,
        hex: slice,
        span: [field.start_pos, field.end_pos],
    })
}

fn decode_value(
    reader: &FieldReader<'_>,
    field: &Field,
    ty: FieldType,
    slice: &str,
) -> Result<FieldValue, DecodeError> {
    let base = ty.base;
    let ordered = || reader.ordered_bytes(field.start_pos, field.end_pos, field.endian);
    // raw bytes in stream order, independent of endianness
    let raw = || reader.ordered_bytes(field.start_pos, field.end_pos, Endian::Big);

    let value = match base {
        BaseType::U8
        | BaseType::U16
        | BaseType::U32
        | BaseType::U64
        | BaseType::I8
        | BaseType::I16
        | BaseType::I32
        | BaseType::I64 => {
            let bytes = ordered()?;
            let width = base.fixed_width().unwrap_or(bytes.len());
            require_width(&bytes, base.as_str(), width)?;
            let unsigned = be_unsigned(&bytes);
            if base.is_signed() {
                FieldValue::Signed(sign_extend(unsigned, width))
            } else {
                FieldValue::Unsigned(unsigned)
            }
        }
        BaseType::Float => {
            let bytes = ordered()?;
            require_width(&bytes, base.as_str(), 4)?;
            let value = f32::from_bits(be_unsigned(&bytes) as u32);
            FieldValue::Float(round_float(f64::from(value)))
        }
        BaseType::Double => {
            let bytes = ordered()?;
            require_width(&bytes, base.as_str(), 8)?;
            FieldValue::Float(round_float(f64::from_bits(be_unsigned(&bytes))))
        }
        BaseType::Bool => FieldValue::Bool(raw()?.iter().any(|&b| b != 0)),
        BaseType::Hex => FieldValue::Text(format!("0x{slice}")),
        BaseType::Bytes => FieldValue::Text(slice.to_string()),
        BaseType::Ascii => FieldValue::Text(text::ascii_lossy(&raw()?)),
        BaseType::Utf8 => FieldValue::Text(text::utf8_lossy(&raw()?)),
        BaseType::Char | BaseType::String => {
            let bytes = raw()?;
            let decoded = match ty.sub {
                Some(TextKind::Ascii) => Some(text::ascii_glyphs(&bytes)),
                Some(TextKind::Utf8) => Some(text::utf8_lossy(&bytes)),
                Some(TextKind::Gb2312) => Some(text::gb2312_lossy(&bytes)),
                Some(TextKind::Latin1) => Some(text::latin1(&bytes)),
                None => text::auto_detect(&bytes),
            };
            FieldValue::Text(decoded.unwrap_or_else(|| slice.to_string()))
        }
        BaseType::Date => FieldValue::Text(format_date(&ordered()?)?),
        BaseType::Timestamp => {
            let bytes = ordered()?;
            require_width(&bytes, base.as_str(), layout::TIMESTAMP_WIDTH)?;
            let seconds = be_unsigned(&bytes) as u32;
            let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
            FieldValue::Text(format_timestamp(seconds, offset)?)
        }
    };
    Ok(value)
}

/// Round to the display precision used for floats.
pub fn round_float(value: f64) -> f64 {
    let scale = 10f64.powi(layout::FLOAT_DECIMALS);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

/// Format `YYYY MM DD` bytes (most significant first) as `YYYY-MM-DD`.
pub fn format_date(bytes: &[u8]) -> Result<String, DecodeError> {
    let &[y0, y1, month, day] = bytes else {
        return Err(DecodeError::WidthMismatch {
            base: BaseType::Date.as_str(),
            expected: layout::DATE_WIDTH,
            actual: bytes.len(),
        });
    };
    let year = u16::from_be_bytes([y0, y1]);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(DecodeError::InvalidDate { year, month, day });
    }
    Ok(format!("{year:04}-{month:02}-{day:02}"))
}

/// Format Unix seconds as `YYYY-MM-DD HH:MM:SS` at `offset`.
pub fn format_timestamp(seconds: u32, offset: UtcOffset) -> Result<String, DecodeError> {
    let failed = |message: String| DecodeError::InvalidTimestamp { seconds, message };
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp(i64::from(seconds))
        .map_err(|e| failed(e.to_string()))?
        .to_offset(offset)
        .format(format)
        .map_err(|e| failed(e.to_string()))
}
