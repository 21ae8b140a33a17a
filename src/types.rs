use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::BuildHasherDefault;

use crate::error::RegisterError;

pub type FastMap<K, V> = std::collections::HashMap<K, V, BuildHasherDefault<FxHasher>>;

// ─── Record Layout ──────────────────────────────────────────────────────────
//
//  Packing::BitsFirst over a span of N bytes:
//
//  ┌──────────────────────────────────────────────┐
//  │ Bit bytes                                    │
//  │   bit fields in declaration order, LSB first │
//  │   unused high bits of the last byte wasted   │
//  ├──────────────────────────────────────────────┤
//  │ Byte fields                                  │
//  │   scalars / raw / text in declaration order  │
//  │   scalars little-endian, blobs zero-padded   │
//  ├──────────────────────────────────────────────┤
//  │ Unused tail (up to span)                     │
//  └──────────────────────────────────────────────┘

/// Widest bit field a packed or ordered record accepts.
pub const MAX_PACKED_BIT_WIDTH: u8 = 8;
/// Widest indexed bit register word.
pub const MAX_REGISTER_BITS: usize = 32;

// ─── Scalar formats ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFormat {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ScalarFormat {
    /// Byte width of one element.
    #[inline]
    pub fn width(self) -> usize {
        match self {
            ScalarFormat::U8 | ScalarFormat::I8 => 1,
            ScalarFormat::U16 | ScalarFormat::I16 => 2,
            ScalarFormat::U32 | ScalarFormat::I32 | ScalarFormat::F32 => 4,
            ScalarFormat::U64 | ScalarFormat::I64 | ScalarFormat::F64 => 8,
        }
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, ScalarFormat::F32 | ScalarFormat::F64)
    }

    #[inline]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarFormat::I8 | ScalarFormat::I16 | ScalarFormat::I32 | ScalarFormat::I64
        )
    }

    /// Canonical tag, used by the fingerprint and `Display`.
    pub fn tag(self) -> &'static str {
        match self {
            ScalarFormat::U8 => "UINT8",
            ScalarFormat::I8 => "INT8",
            ScalarFormat::U16 => "UINT16",
            ScalarFormat::I16 => "INT16",
            ScalarFormat::U32 => "UINT32",
            ScalarFormat::I32 => "INT32",
            ScalarFormat::U64 => "UINT64",
            ScalarFormat::I64 => "INT64",
            ScalarFormat::F32 => "FLOAT32",
            ScalarFormat::F64 => "FLOAT64",
        }
    }
}

/// A parsed format tag from a field declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    Scalar(ScalarFormat),
    Raw,
    Text,
}

impl FormatTag {
    /// Accepts struct-style characters (`B`, `h`, `Q`, `d`, ...) and
    /// register-style names (`UINT16`, `FLOAT32`, `ARRAY`, ...).
    pub fn parse(tag: &str) -> Result<Self, RegisterError> {
        use ScalarFormat::*;
        Ok(match tag {
            "B" | "UINT8" => FormatTag::Scalar(U8),
            "b" | "INT8" => FormatTag::Scalar(I8),
            "H" | "UINT16" => FormatTag::Scalar(U16),
            "h" | "INT16" => FormatTag::Scalar(I16),
            "I" | "L" | "UINT32" => FormatTag::Scalar(U32),
            "i" | "l" | "INT32" => FormatTag::Scalar(I32),
            "Q" | "UINT64" => FormatTag::Scalar(U64),
            "q" | "INT64" => FormatTag::Scalar(I64),
            "f" | "FLOAT32" => FormatTag::Scalar(F32),
            "d" | "FLOAT64" => FormatTag::Scalar(F64),
            "ARRAY" => FormatTag::Raw,
            "s" | "TEXT" => FormatTag::Text,
            other => return Err(RegisterError::UnsupportedFormat(other.into())),
        })
    }
}

// ─── Field kinds ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Flag or multi-bit bitfield sharing a byte with other bit fields.
    Bit,
    /// Fixed-width little-endian number (or array of numbers).
    Scalar(ScalarFormat),
    /// Fixed-length byte blob.
    Raw,
    /// Fixed-length byte blob holding UTF-8 text.
    Text,
}

impl FieldKind {
    #[inline]
    pub fn is_bit(&self) -> bool {
        matches!(self, FieldKind::Bit)
    }

    pub(crate) fn tag_byte(&self) -> u8 {
        match self {
            FieldKind::Bit => 0,
            FieldKind::Scalar(_) => 1,
            FieldKind::Raw => 2,
            FieldKind::Text => 3,
        }
    }
}

// ─── PositionAssignment ─────────────────────────────────────────────────────

/// Where one field lives inside the record window.
///
/// `bit_offset`/`bit_width` are only meaningful for bit fields (zero for the
/// rest). For bit fields `element_width` is the byte window the accessor
/// reads through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PositionRepr")]
pub struct PositionAssignment {
    pub byte_offset: usize,
    pub bit_offset: u8,
    pub bit_width: u8,
    pub element_width: usize,
    pub array_length: usize,
}

impl PositionAssignment {
    pub fn bits(byte_offset: usize, bit_offset: u8, bit_width: u8) -> Self {
        let covered = (bit_offset as usize + bit_width as usize).div_ceil(8);
        Self {
            byte_offset,
            bit_offset,
            bit_width,
            element_width: covered,
            array_length: 1,
        }
    }

    pub fn bytes(byte_offset: usize, element_width: usize, array_length: usize) -> Self {
        Self {
            byte_offset,
            bit_offset: 0,
            bit_width: 0,
            element_width,
            array_length,
        }
    }

    #[inline]
    pub fn is_bits(&self) -> bool {
        self.bit_width > 0
    }

    /// Bytes covered by the field, starting at `byte_offset`.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.element_width * self.array_length
    }

    /// One-past-the-end byte of the field.
    #[inline]
    pub fn end(&self) -> usize {
        self.byte_offset + self.byte_len()
    }

    /// `end` for positions that did not come from the compiler.
    #[inline]
    pub(crate) fn checked_end(&self) -> Option<usize> {
        self.element_width
            .checked_mul(self.array_length)?
            .checked_add(self.byte_offset)
    }

    /// Bit mask relative to `byte_offset`; zero for byte fields.
    #[inline]
    pub fn mask(&self) -> u32 {
        if !self.is_bits() {
            return 0;
        }
        let ones = if self.bit_width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.bit_width) - 1
        };
        ones << self.bit_offset
    }
}

/// Accepts both the keyed form and a positional 5-tuple
/// `[byte_offset, bit_offset, bit_width, element_width, array_length]`
/// that lossy round-trips through generic sequences produce.
#[derive(Deserialize)]
#[serde(untagged)]
enum PositionRepr {
    Keyed {
        byte_offset: usize,
        bit_offset: u8,
        bit_width: u8,
        element_width: usize,
        array_length: usize,
    },
    Tuple(usize, u8, u8, usize, usize),
}

impl From<PositionRepr> for PositionAssignment {
    fn from(repr: PositionRepr) -> Self {
        match repr {
            PositionRepr::Keyed {
                byte_offset,
                bit_offset,
                bit_width,
                element_width,
                array_length,
            }
            | PositionRepr::Tuple(byte_offset, bit_offset, bit_width, element_width, array_length) => {
                PositionAssignment {
                    byte_offset,
                    bit_offset,
                    bit_width,
                    element_width,
                    array_length,
                }
            }
        }
    }
}
