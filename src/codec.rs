use arrayvec::ArrayVec;
use smol_str::SmolStr;

use crate::error::RegisterError;
use crate::types::ScalarFormat;
use crate::value::FieldValue;

// ════════════════════════════════════════════════════════════════════════
// Bit windows
// ════════════════════════════════════════════════════════════════════════

#[inline]
fn ones(width: u8) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}

/// Little-endian word over at most 8 bytes.
#[inline]
fn load_word(window: &[u8]) -> u64 {
    window
        .iter()
        .take(8)
        .enumerate()
        .fold(0u64, |w, (i, b)| w | ((*b as u64) << (8 * i)))
}

#[inline]
fn store_word(window: &mut [u8], word: u64) {
    for (i, b) in window.iter_mut().take(8).enumerate() {
        *b = (word >> (8 * i)) as u8;
    }
}

/// Read `bit_width` bits starting `bit_offset` bits into `window`.
#[inline]
pub fn read_bits(window: &[u8], bit_offset: u8, bit_width: u8) -> u32 {
    ((load_word(window) >> bit_offset) & ones(bit_width)) as u32
}

/// Overwrite exactly the field's bits; every other bit of the window is kept.
#[inline]
pub fn write_bits(window: &mut [u8], bit_offset: u8, bit_width: u8, value: u32) {
    let mask = ones(bit_width) << bit_offset;
    let word = (load_word(window) & !mask) | (((value as u64) << bit_offset) & mask);
    store_word(window, word);
}

/// Number of bits needed to represent `value` (0 needs 0 bits).
#[inline]
pub fn bits_needed(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

// ════════════════════════════════════════════════════════════════════════
// Scalars (little-endian)
// ════════════════════════════════════════════════════════════════════════

pub fn decode_scalar(fmt: ScalarFormat, bytes: &[u8]) -> FieldValue {
    let mut raw = [0u8; 8];
    let n = fmt.width().min(bytes.len());
    raw[..n].copy_from_slice(&bytes[..n]);
    match fmt {
        ScalarFormat::U8 => FieldValue::UInt(raw[0] as u64),
        ScalarFormat::I8 => FieldValue::Int(raw[0] as i8 as i64),
        ScalarFormat::U16 => FieldValue::UInt(u16::from_le_bytes([raw[0], raw[1]]) as u64),
        ScalarFormat::I16 => FieldValue::Int(i16::from_le_bytes([raw[0], raw[1]]) as i64),
        ScalarFormat::U32 => {
            FieldValue::UInt(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64)
        }
        ScalarFormat::I32 => {
            FieldValue::Int(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64)
        }
        ScalarFormat::U64 => FieldValue::UInt(u64::from_le_bytes(raw)),
        ScalarFormat::I64 => FieldValue::Int(i64::from_le_bytes(raw)),
        ScalarFormat::F32 => {
            FieldValue::Float(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64)
        }
        ScalarFormat::F64 => FieldValue::Float(f64::from_le_bytes(raw)),
    }
}

fn int_range(fmt: ScalarFormat) -> (i128, i128) {
    match fmt {
        ScalarFormat::U8 => (0, u8::MAX as i128),
        ScalarFormat::I8 => (i8::MIN as i128, i8::MAX as i128),
        ScalarFormat::U16 => (0, u16::MAX as i128),
        ScalarFormat::I16 => (i16::MIN as i128, i16::MAX as i128),
        ScalarFormat::U32 => (0, u32::MAX as i128),
        ScalarFormat::I32 => (i32::MIN as i128, i32::MAX as i128),
        ScalarFormat::U64 => (0, u64::MAX as i128),
        ScalarFormat::I64 => (i64::MIN as i128, i64::MAX as i128),
        ScalarFormat::F32 | ScalarFormat::F64 => (0, 0),
    }
}

/// Encode one scalar element into exactly `fmt.width()` bytes.
pub fn encode_scalar(
    field: &SmolStr,
    fmt: ScalarFormat,
    value: &FieldValue,
) -> Result<ArrayVec<u8, 8>, RegisterError> {
    let mut out: ArrayVec<u8, 8> = ArrayVec::new();

    if fmt.is_float() {
        let v = value.as_f64().ok_or_else(|| RegisterError::TypeMismatch {
            field: field.clone(),
            expected: "number",
        })?;
        match fmt {
            ScalarFormat::F32 => out.extend((v as f32).to_le_bytes()),
            _ => out.extend(v.to_le_bytes()),
        }
        return Ok(out);
    }

    let v: i128 = match value {
        FieldValue::Bits(b) => *b as i128,
        FieldValue::UInt(u) => *u as i128,
        FieldValue::Int(i) => *i as i128,
        _ => {
            return Err(RegisterError::TypeMismatch {
                field: field.clone(),
                expected: "integer",
            });
        }
    };
    let (lo, hi) = int_range(fmt);
    if v < lo || v > hi {
        return Err(RegisterError::ValueOutOfRange {
            field: field.clone(),
            value: v.to_string(),
        });
    }
    // two's complement truncation is exact once the range check passed
    out.extend((v as i64 as u64).to_le_bytes().into_iter().take(fmt.width()));
    Ok(out)
}

// ════════════════════════════════════════════════════════════════════════
// Blobs
// ════════════════════════════════════════════════════════════════════════

/// Copy `src` into `dst`, zero-padding the tail. Never truncates.
pub fn write_blob(field: &SmolStr, dst: &mut [u8], src: &[u8]) -> Result<(), RegisterError> {
    if src.len() > dst.len() {
        return Err(RegisterError::ValueTooLong {
            field: field.clone(),
            capacity: dst.len(),
            actual: src.len(),
        });
    }
    dst[..src.len()].copy_from_slice(src);
    dst[src.len()..].fill(0);
    Ok(())
}

/// Text stored in a zero-padded blob; trailing NULs are padding.
pub fn decode_text(bytes: &[u8]) -> SmolStr {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    SmolStr::new(String::from_utf8_lossy(&bytes[..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> SmolStr {
        SmolStr::new("F")
    }

    #[test]
    fn test_bits_roundtrip_in_one_byte() {
        let mut b = [0b0000_0001u8];
        write_bits(&mut b, 1, 4, 5);
        assert_eq!(b[0], 0b0000_1011);
        assert_eq!(read_bits(&b, 1, 4), 5);
        assert_eq!(read_bits(&b, 0, 1), 1);
    }

    #[test]
    fn test_bits_clear_leaves_neighbours() {
        let mut b = [0xFFu8];
        write_bits(&mut b, 3, 1, 0);
        assert_eq!(b[0], 0b1111_0111);
    }

    #[test]
    fn test_bits_across_byte_boundary() {
        let mut b = [0u8, 0xF0];
        write_bits(&mut b, 6, 4, 0b1011);
        assert_eq!(b, [0b1100_0000, 0xF2]);
        assert_eq!(read_bits(&b, 6, 4), 0b1011);
    }

    #[test]
    fn test_bits_needed() {
        assert_eq!(bits_needed(0), 0);
        assert_eq!(bits_needed(1), 1);
        assert_eq!(bits_needed(15), 4);
        assert_eq!(bits_needed(16), 5);
    }

    #[test]
    fn test_scalar_little_endian() {
        let bytes = encode_scalar(&name(), ScalarFormat::U16, &FieldValue::UInt(0x1234)).unwrap();
        assert_eq!(bytes.as_slice(), &[0x34, 0x12]);
        assert_eq!(decode_scalar(ScalarFormat::U16, &bytes), FieldValue::UInt(0x1234));
    }

    #[test]
    fn test_scalar_signed() {
        let bytes = encode_scalar(&name(), ScalarFormat::I16, &FieldValue::Int(-2)).unwrap();
        assert_eq!(bytes.as_slice(), &[0xFE, 0xFF]);
        assert_eq!(decode_scalar(ScalarFormat::I16, &bytes), FieldValue::Int(-2));
    }

    #[test]
    fn test_scalar_float() {
        let bytes = encode_scalar(&name(), ScalarFormat::F32, &FieldValue::Float(1.5)).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(decode_scalar(ScalarFormat::F32, &bytes), FieldValue::Float(1.5));

        let bytes = encode_scalar(&name(), ScalarFormat::F64, &FieldValue::Int(3)).unwrap();
        assert_eq!(decode_scalar(ScalarFormat::F64, &bytes), FieldValue::Float(3.0));
    }

    #[test]
    fn test_scalar_out_of_range() {
        assert!(matches!(
            encode_scalar(&name(), ScalarFormat::U8, &FieldValue::UInt(300)),
            Err(RegisterError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            encode_scalar(&name(), ScalarFormat::U32, &FieldValue::Int(-1)),
            Err(RegisterError::ValueOutOfRange { .. })
        ));
        assert!(encode_scalar(&name(), ScalarFormat::I8, &FieldValue::Int(-128)).is_ok());
    }

    #[test]
    fn test_scalar_rejects_text() {
        assert!(matches!(
            encode_scalar(&name(), ScalarFormat::U8, &FieldValue::from("x")),
            Err(RegisterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_blob_padding_and_overflow() {
        let mut dst = [0xAAu8; 4];
        write_blob(&name(), &mut dst, b"ab").unwrap();
        assert_eq!(dst, [b'a', b'b', 0, 0]);

        let err = write_blob(&name(), &mut dst, b"abcde").unwrap_err();
        assert!(matches!(err, RegisterError::ValueTooLong { capacity: 4, actual: 5, .. }));
        assert_eq!(dst, [b'a', b'b', 0, 0]);
    }

    #[test]
    fn test_decode_text_strips_padding() {
        assert_eq!(decode_text(b"ab\0\0"), "ab");
        assert_eq!(decode_text(b"\0\0"), "");
        assert_eq!(decode_text("héllo".as_bytes()), "héllo");
    }
}
