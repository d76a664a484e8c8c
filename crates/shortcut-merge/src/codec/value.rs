//! Object encoding/decoding for the binary plist format.
//!
//! Every object starts with a marker byte. The high nibble selects the kind, the low
//! nibble holds a small inline length (or `0xF`, meaning the length follows as an
//! integer object). Containers store fixed-width references into the object table.

use crate::codec::primitives::{min_width, Reader, Writer};
use crate::error::DecodeError;
use crate::limits::INLINE_LEN_SENTINEL;
use crate::model::Value;

/// High-nibble object markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Marker {
    Simple = 0x0,
    Integer = 0x1,
    Real = 0x2,
    Date = 0x3,
    Data = 0x4,
    Ascii = 0x5,
    Utf16 = 0x6,
    Uid = 0x8,
    Array = 0xA,
    Set = 0xC,
    Dict = 0xD,
}

impl Marker {
    /// Creates a Marker from the high nibble of a marker byte.
    pub fn from_u8(v: u8) -> Option<Marker> {
        match v {
            0x0 => Some(Marker::Simple),
            0x1 => Some(Marker::Integer),
            0x2 => Some(Marker::Real),
            0x3 => Some(Marker::Date),
            0x4 => Some(Marker::Data),
            0x5 => Some(Marker::Ascii),
            0x6 => Some(Marker::Utf16),
            0x8 => Some(Marker::Uid),
            0xA => Some(Marker::Array),
            0xC => Some(Marker::Set),
            0xD => Some(Marker::Dict),
            _ => None,
        }
    }
}

const NULL: u8 = 0x00;
const FALSE: u8 = 0x08;
const TRUE: u8 = 0x09;
const FILL: u8 = 0x0F;
const DATE: u8 = 0x33;

/// One decoded object before its references are resolved.
///
/// Reference values are raw object-table indices, already checked against the
/// object count.
#[derive(Debug, Clone, PartialEq)]
pub enum RawObject {
    Leaf(Value),
    Array(Vec<u64>),
    Set(Vec<u64>),
    Dict { keys: Vec<u64>, values: Vec<u64> },
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes the object at the reader's position.
pub fn decode_object(
    reader: &mut Reader<'_>,
    ref_size: usize,
    object_count: u64,
) -> Result<RawObject, DecodeError> {
    let offset = reader.position();
    let marker = reader.read_byte("marker")?;
    let info = marker & 0x0F;

    let kind = Marker::from_u8(marker >> 4).ok_or(DecodeError::UnknownMarker { marker, offset })?;

    let object = match kind {
        Marker::Simple => match marker {
            NULL | FILL => RawObject::Leaf(Value::Null),
            FALSE => RawObject::Leaf(Value::Bool(false)),
            TRUE => RawObject::Leaf(Value::Bool(true)),
            _ => return Err(DecodeError::UnknownMarker { marker, offset }),
        },
        Marker::Integer => RawObject::Leaf(Value::Integer(decode_int_body(reader, info)?)),
        Marker::Real => RawObject::Leaf(Value::Real(decode_real_body(reader, info)?)),
        Marker::Date => {
            if marker != DATE {
                return Err(DecodeError::UnknownMarker { marker, offset });
            }
            RawObject::Leaf(Value::Date(reader.read_f64("date")?))
        }
        Marker::Data => {
            let len = decode_length(reader, info)?;
            RawObject::Leaf(Value::Data(reader.read_bytes(len, "data")?.to_vec()))
        }
        Marker::Ascii => {
            let len = decode_length(reader, info)?;
            let start = reader.position();
            let bytes = reader.read_bytes(len, "ascii string")?;
            if let Some(bad) = bytes.iter().position(|b| !b.is_ascii()) {
                return Err(DecodeError::InvalidAscii { offset: start + bad });
            }
            // ASCII is valid UTF-8
            RawObject::Leaf(Value::String(bytes.iter().map(|&b| b as char).collect()))
        }
        Marker::Utf16 => {
            let units = decode_length(reader, info)?;
            let byte_len = units.checked_mul(2).ok_or(DecodeError::InvalidLength {
                context: "utf16 string",
                len: units as i128,
            })?;
            let bytes = reader.read_bytes(byte_len, "utf16 string")?;
            let code_units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            let s = String::from_utf16(&code_units)
                .map_err(|_| DecodeError::InvalidUtf16 { offset })?;
            RawObject::Leaf(Value::String(s))
        }
        Marker::Uid => {
            let width = info as usize + 1;
            RawObject::Leaf(Value::Uid(reader.read_uint(width, "uid")?))
        }
        Marker::Array => {
            let len = decode_length(reader, info)?;
            RawObject::Array(decode_refs(reader, len, ref_size, object_count)?)
        }
        Marker::Set => {
            let len = decode_length(reader, info)?;
            RawObject::Set(decode_refs(reader, len, ref_size, object_count)?)
        }
        Marker::Dict => {
            let len = decode_length(reader, info)?;
            let keys = decode_refs(reader, len, ref_size, object_count)?;
            let values = decode_refs(reader, len, ref_size, object_count)?;
            RawObject::Dict { keys, values }
        }
    };

    Ok(object)
}

/// Reads an integer body whose width is `2^exp` bytes.
///
/// 1, 2 and 4 byte integers are unsigned; 8 byte integers are two's complement
/// signed; 16 byte integers are two's complement signed 128-bit.
fn decode_int_body(reader: &mut Reader<'_>, exp: u8) -> Result<i128, DecodeError> {
    match exp {
        0..=2 => Ok(reader.read_uint(1 << exp, "integer")? as i128),
        3 => Ok(reader.read_uint(8, "integer")? as i64 as i128),
        4 => {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(reader.read_bytes(16, "integer")?);
            Ok(i128::from_be_bytes(buf))
        }
        _ => Err(DecodeError::InvalidWidth {
            kind: "integer",
            width: 1usize << exp.min(15),
        }),
    }
}

fn decode_real_body(reader: &mut Reader<'_>, exp: u8) -> Result<f64, DecodeError> {
    match exp {
        2 => Ok(reader.read_f32("real")? as f64),
        3 => reader.read_f64("real"),
        _ => Err(DecodeError::InvalidWidth {
            kind: "real",
            width: 1usize << exp.min(15),
        }),
    }
}

/// Resolves the inline length nibble, reading an integer object when it is `0xF`.
fn decode_length(reader: &mut Reader<'_>, info: u8) -> Result<usize, DecodeError> {
    if info != INLINE_LEN_SENTINEL {
        return Ok(info as usize);
    }

    let offset = reader.position();
    let marker = reader.read_byte("length marker")?;
    if Marker::from_u8(marker >> 4) != Some(Marker::Integer) {
        return Err(DecodeError::UnknownMarker { marker, offset });
    }
    let len = decode_int_body(reader, marker & 0x0F)?;
    if len < 0 || len > reader.remaining_len() as i128 {
        // no object can be longer than the bytes that follow it
        return Err(DecodeError::InvalidLength { context: "object", len });
    }
    Ok(len as usize)
}

fn decode_refs(
    reader: &mut Reader<'_>,
    len: usize,
    ref_size: usize,
    object_count: u64,
) -> Result<Vec<u64>, DecodeError> {
    let byte_len = len.checked_mul(ref_size).ok_or(DecodeError::InvalidLength {
        context: "references",
        len: len as i128,
    })?;
    let mut refs = Reader::new(reader.read_bytes(byte_len, "references")?);

    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let index = refs.read_uint(ref_size, "reference")?;
        if index >= object_count {
            return Err(DecodeError::ReferenceOutOfBounds {
                index,
                count: object_count,
            });
        }
        out.push(index);
    }
    Ok(out)
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a leaf value. Containers are written by [`encode_container`].
pub fn encode_leaf(writer: &mut Writer, value: &Value) {
    match value {
        Value::Null => writer.write_byte(NULL),
        Value::Bool(false) => writer.write_byte(FALSE),
        Value::Bool(true) => writer.write_byte(TRUE),
        Value::Integer(v) => encode_int(writer, *v),
        Value::Real(v) => {
            writer.write_byte(((Marker::Real as u8) << 4) | 3);
            writer.write_f64(*v);
        }
        Value::Date(v) => {
            writer.write_byte(DATE);
            writer.write_f64(*v);
        }
        Value::Data(bytes) => {
            encode_header(writer, Marker::Data, bytes.len());
            writer.write_bytes(bytes);
        }
        Value::String(s) => encode_string(writer, s),
        Value::Uid(v) => {
            let width = uid_width(*v);
            writer.write_byte(((Marker::Uid as u8) << 4) | (width as u8 - 1));
            writer.write_uint(*v, width);
        }
        // containers carry references and go through encode_container
        Value::Array(_) | Value::Set(_) | Value::Dict(_) => {}
    }
}

/// Encodes a container header followed by its already-resolved references.
pub fn encode_container(writer: &mut Writer, marker: Marker, len: usize, refs: &[u64], ref_size: usize) {
    encode_header(writer, marker, len);
    for &r in refs {
        writer.write_uint(r, ref_size);
    }
}

/// Encodes a string as ASCII when possible, otherwise as UTF-16BE.
pub fn encode_string(writer: &mut Writer, s: &str) {
    if s.is_ascii() {
        encode_header(writer, Marker::Ascii, s.len());
        writer.write_bytes(s.as_bytes());
    } else {
        let units: Vec<u16> = s.encode_utf16().collect();
        encode_header(writer, Marker::Utf16, units.len());
        for unit in units {
            writer.write_bytes(&unit.to_be_bytes());
        }
    }
}

/// Encodes an integer in the smallest width a reader will interpret identically.
pub fn encode_int(writer: &mut Writer, v: i128) {
    let marker = (Marker::Integer as u8) << 4;
    if (0..=u32::MAX as i128).contains(&v) {
        let width = min_width(v as u64);
        writer.write_byte(marker | width.trailing_zeros() as u8);
        writer.write_uint(v as u64, width);
    } else if let Ok(small) = i64::try_from(v) {
        writer.write_byte(marker | 3);
        writer.write_uint(small as u64, 8);
    } else {
        writer.write_byte(marker | 4);
        writer.write_bytes(&v.to_be_bytes());
    }
}

fn encode_header(writer: &mut Writer, marker: Marker, len: usize) {
    let high = (marker as u8) << 4;
    if len < INLINE_LEN_SENTINEL as usize {
        writer.write_byte(high | len as u8);
    } else {
        writer.write_byte(high | INLINE_LEN_SENTINEL);
        encode_int(writer, len as i128);
    }
}

fn uid_width(v: u64) -> usize {
    let bytes = (64 - v.leading_zeros() as usize).div_ceil(8);
    bytes.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_leaf(bytes: &[u8]) -> Result<Value, DecodeError> {
        let mut reader = Reader::new(bytes);
        match decode_object(&mut reader, 1, 1)? {
            RawObject::Leaf(v) => Ok(v),
            other => panic!("expected leaf, got {:?}", other),
        }
    }

    fn leaf_roundtrip(value: Value) -> Value {
        let mut writer = Writer::new();
        encode_leaf(&mut writer, &value);
        decode_leaf(writer.as_bytes()).unwrap()
    }

    #[test]
    fn test_simple_markers() {
        assert_eq!(decode_leaf(&[0x00]).unwrap(), Value::Null);
        assert_eq!(decode_leaf(&[0x0F]).unwrap(), Value::Null);
        assert_eq!(decode_leaf(&[0x08]).unwrap(), Value::Bool(false));
        assert_eq!(decode_leaf(&[0x09]).unwrap(), Value::Bool(true));
        assert!(matches!(
            decode_leaf(&[0x07]),
            Err(DecodeError::UnknownMarker { marker: 0x07, .. })
        ));
    }

    #[test]
    fn test_unknown_high_nibble() {
        assert!(matches!(
            decode_leaf(&[0x70]),
            Err(DecodeError::UnknownMarker { marker: 0x70, offset: 0 })
        ));
    }

    #[test]
    fn test_small_ints_are_unsigned() {
        assert_eq!(decode_leaf(&[0x10, 0xFF]).unwrap(), Value::Integer(255));
        assert_eq!(decode_leaf(&[0x11, 0xFF, 0xFF]).unwrap(), Value::Integer(65535));
        assert_eq!(
            decode_leaf(&[0x12, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            Value::Integer(u32::MAX as i128)
        );
    }

    #[test]
    fn test_eight_byte_int_is_signed() {
        assert_eq!(
            decode_leaf(&[0x13, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            Value::Integer(-1)
        );
    }

    #[test]
    fn test_int_widths_minimal() {
        let cases: [(i128, usize); 7] = [
            (0, 2),
            (255, 2),
            (256, 3),
            (70000, 5),
            (-1, 9),
            (u32::MAX as i128 + 1, 9),
            (u64::MAX as i128, 17),
        ];
        for (v, len) in cases {
            let mut writer = Writer::new();
            encode_int(&mut writer, v);
            assert_eq!(writer.len(), len, "width for {}", v);
            assert_eq!(decode_leaf(writer.as_bytes()).unwrap(), Value::Integer(v));
        }
    }

    #[test]
    fn test_invalid_int_width() {
        assert!(matches!(
            decode_leaf(&[0x15, 0, 0]),
            Err(DecodeError::InvalidWidth { kind: "integer", width: 32 })
        ));
    }

    #[test]
    fn test_reals() {
        assert_eq!(decode_leaf(&[0x22, 0x3F, 0xC0, 0x00, 0x00]).unwrap(), Value::Real(1.5));
        assert_eq!(leaf_roundtrip(Value::Real(-2.25)), Value::Real(-2.25));
        assert!(matches!(
            decode_leaf(&[0x21, 0, 0]),
            Err(DecodeError::InvalidWidth { kind: "real", width: 2 })
        ));
    }

    #[test]
    fn test_date() {
        assert_eq!(leaf_roundtrip(Value::Date(7.5e8)), Value::Date(7.5e8));
        assert!(matches!(
            decode_leaf(&[0x32, 0, 0, 0, 0]),
            Err(DecodeError::UnknownMarker { marker: 0x32, .. })
        ));
    }

    #[test]
    fn test_strings() {
        assert_eq!(leaf_roundtrip(Value::String("hello".into())), Value::String("hello".into()));

        let unicode = "caf\u{e9} \u{1F600}".to_string();
        let mut writer = Writer::new();
        encode_string(&mut writer, &unicode);
        assert_eq!(writer.as_bytes()[0] >> 4, Marker::Utf16 as u8);
        assert_eq!(decode_leaf(writer.as_bytes()).unwrap(), Value::String(unicode));
    }

    #[test]
    fn test_non_ascii_in_ascii_string() {
        assert!(matches!(
            decode_leaf(&[0x52, b'a', 0xC3]),
            Err(DecodeError::InvalidAscii { offset: 2 })
        ));
    }

    #[test]
    fn test_unpaired_surrogate() {
        assert!(matches!(
            decode_leaf(&[0x61, 0xD8, 0x00]),
            Err(DecodeError::InvalidUtf16 { .. })
        ));
    }

    #[test]
    fn test_long_length_uses_int_object() {
        let data = vec![7u8; 40];
        let mut writer = Writer::new();
        encode_leaf(&mut writer, &Value::Data(data.clone()));
        assert_eq!(&writer.as_bytes()[..3], &[0x4F, 0x10, 40]);
        assert_eq!(decode_leaf(writer.as_bytes()).unwrap(), Value::Data(data));
    }

    #[test]
    fn test_length_exceeding_input() {
        assert!(matches!(
            decode_leaf(&[0x4F, 0x11, 0xFF, 0xFF]),
            Err(DecodeError::InvalidLength { len: 65535, .. })
        ));
        assert!(matches!(
            decode_leaf(&[0x4F, 0x13, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            Err(DecodeError::InvalidLength { len: -1, .. })
        ));
    }

    #[test]
    fn test_uid() {
        for v in [0u64, 1, 255, 256, u64::MAX] {
            assert_eq!(leaf_roundtrip(Value::Uid(v)), Value::Uid(v));
        }
        let mut writer = Writer::new();
        encode_leaf(&mut writer, &Value::Uid(5));
        assert_eq!(writer.as_bytes(), &[0x80, 5]);
    }

    #[test]
    fn test_container_refs() {
        let mut writer = Writer::new();
        encode_container(&mut writer, Marker::Array, 2, &[1, 2], 1);
        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(
            decode_object(&mut reader, 1, 3).unwrap(),
            RawObject::Array(vec![1, 2])
        );

        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            decode_object(&mut reader, 1, 2),
            Err(DecodeError::ReferenceOutOfBounds { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_dict_refs() {
        let mut writer = Writer::new();
        encode_container(&mut writer, Marker::Dict, 1, &[1, 2], 2);
        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(
            decode_object(&mut reader, 2, 3).unwrap(),
            RawObject::Dict {
                keys: vec![1],
                values: vec![2]
            }
        );
    }
}
