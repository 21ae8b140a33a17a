use serde::ser::{Serialize, SerializeSeq, Serializer};
use smol_str::SmolStr;
use std::fmt;

// ─── FieldValue ─────────────────────────────────────────────────────────────

/// A decoded field value, or a value about to be encoded into a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Contents of a bit field, right-aligned.
    Bits(u32),
    UInt(u64),
    Int(i64),
    Float(f64),
    /// Elements of a scalar array field.
    Array(Vec<FieldValue>),
    Bytes(Vec<u8>),
    Text(SmolStr),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Bits(b) => Some(*b as u64),
            FieldValue::UInt(u) => Some(*u),
            FieldValue::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Bits(b) => Some(*b as i64),
            FieldValue::UInt(u) => i64::try_from(*u).ok(),
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::UInt(u) => Some(*u as f64),
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Bits(b) => Some(*b as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_u64().map(|v| v != 0)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            FieldValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bits(b) => write!(f, "{b:#b}"),
            FieldValue::UInt(u) => write!(f, "{u}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            FieldValue::Bytes(b) => write!(f, "{b:02x?}"),
            FieldValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

// ─── Serialize (for JSON dumps of a record) ─────────────────────────────────

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Bits(b) => serializer.serialize_u32(*b),
            FieldValue::UInt(u) => serializer.serialize_u64(*u),
            FieldValue::Int(i) => serializer.serialize_i64(*i),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for v in items {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            FieldValue::Bytes(b) => {
                let mut seq = serializer.serialize_seq(Some(b.len()))?;
                for byte in b {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
            FieldValue::Text(s) => serializer.serialize_str(s.as_str()),
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bits(b as u32)
    }
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for FieldValue {
            fn from(n: $t) -> Self {
                FieldValue::UInt(n as u64)
            }
        }
    )*};
}

macro_rules! from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for FieldValue {
            fn from(n: $t) -> Self {
                FieldValue::Int(n as i64)
            }
        }
    )*};
}

from_unsigned!(u8, u16, u32, u64);
from_signed!(i8, i16, i32, i64);

impl From<f32> for FieldValue {
    fn from(n: f32) -> Self {
        FieldValue::Float(n as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Float(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(SmolStr::from(s))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(SmolStr::from(s))
    }
}

impl From<&[u8]> for FieldValue {
    fn from(b: &[u8]) -> Self {
        FieldValue::Bytes(b.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for FieldValue {
    fn from(b: &[u8; N]) -> Self {
        FieldValue::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        FieldValue::Bytes(b)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(FieldValue::from(true).as_u64(), Some(1));
        assert_eq!(FieldValue::from(-3i16).as_i64(), Some(-3));
        assert_eq!(FieldValue::from(-3i16).as_u64(), None);
        assert_eq!(FieldValue::from(7u8).as_f64(), Some(7.0));
        assert_eq!(FieldValue::from(u64::MAX).as_i64(), None);
    }

    #[test]
    fn test_byte_views() {
        assert_eq!(FieldValue::from("ab").as_bytes(), Some(&b"ab"[..]));
        assert_eq!(FieldValue::from(b"\x01\x02").as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(FieldValue::from(1u8).as_bytes(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::Bits(5).to_string(), "0b101");
        assert_eq!(FieldValue::from("hi").to_string(), "\"hi\"");
        let arr = FieldValue::Array(vec![1u16.into(), 2u16.into()]);
        assert_eq!(arr.to_string(), "[1, 2]");
    }

    #[test]
    fn test_serialize_json() {
        let v = FieldValue::Array(vec![FieldValue::Int(-1), FieldValue::Float(0.5)]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[-1,0.5]");
        assert_eq!(serde_json::to_string(&FieldValue::Bytes(vec![1, 2])).unwrap(), "[1,2]");
    }
}
