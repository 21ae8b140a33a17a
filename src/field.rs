use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::RegisterError;
use crate::types::*;

// ─── FieldSpec (declaration surface) ────────────────────────────────────────

/// One declared field: `(name, length, is_bit = false, format = none)`.
///
/// Deserializes from a positional tuple (`["FLAG", 1, true]`,
/// `["DATE", 1, "H"]`, `["MODE", 4, true, null]`) or from an object with the
/// same keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SpecRepr")]
pub struct FieldSpec {
    pub name: SmolStr,
    pub length: i64,
    pub is_bit: bool,
    pub format: Option<SmolStr>,
}

impl FieldSpec {
    pub fn new(name: &str, length: i64, is_bit: bool, format: Option<&str>) -> Self {
        Self {
            name: SmolStr::new(name),
            length,
            is_bit,
            format: format.map(SmolStr::new),
        }
    }

    /// A bit field of `width` bits.
    pub fn bit(name: &str, width: i64) -> Self {
        Self::new(name, width, true, None)
    }

    /// A byte field without a format: `u8` when `length == 1`, raw blob otherwise.
    pub fn bytes(name: &str, length: i64) -> Self {
        Self::new(name, length, false, None)
    }

    /// A formatted field (`"H"`, `"FLOAT32"`, `"TEXT"`, ...).
    pub fn formatted(name: &str, length: i64, format: &str) -> Self {
        Self::new(name, length, false, Some(format))
    }
}

impl From<(&str, i64)> for FieldSpec {
    fn from((name, length): (&str, i64)) -> Self {
        FieldSpec::bytes(name, length)
    }
}

impl From<(&str, i64, bool)> for FieldSpec {
    fn from((name, length, is_bit): (&str, i64, bool)) -> Self {
        FieldSpec::new(name, length, is_bit, None)
    }
}

impl From<(&str, i64, &str)> for FieldSpec {
    fn from((name, length, format): (&str, i64, &str)) -> Self {
        FieldSpec::formatted(name, length, format)
    }
}

impl From<(&str, i64, bool, &str)> for FieldSpec {
    fn from((name, length, is_bit, format): (&str, i64, bool, &str)) -> Self {
        FieldSpec::new(name, length, is_bit, Some(format))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpecRepr {
    Keyed {
        name: SmolStr,
        length: i64,
        #[serde(default)]
        is_bit: bool,
        #[serde(default)]
        format: Option<SmolStr>,
    },
    Full(SmolStr, i64, bool, Option<SmolStr>),
    WithBit(SmolStr, i64, bool),
    WithFormat(SmolStr, i64, SmolStr),
    Short(SmolStr, i64),
}

impl From<SpecRepr> for FieldSpec {
    fn from(repr: SpecRepr) -> Self {
        let (name, length, is_bit, format) = match repr {
            SpecRepr::Keyed {
                name,
                length,
                is_bit,
                format,
            } => (name, length, is_bit, format),
            SpecRepr::Full(name, length, is_bit, format) => (name, length, is_bit, format),
            SpecRepr::WithBit(name, length, is_bit) => (name, length, is_bit, None),
            SpecRepr::WithFormat(name, length, format) => (name, length, false, Some(format)),
            SpecRepr::Short(name, length) => (name, length, false, None),
        };
        FieldSpec {
            name,
            length,
            is_bit,
            format,
        }
    }
}

// ─── FieldDescriptor (resolved) ─────────────────────────────────────────────

/// Immutable, resolved description of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: SmolStr,
    pub declared_index: usize,
    pub kind: FieldKind,
    /// Bit width for `Bit`, element count otherwise.
    pub length: usize,
    /// Byte width of one element; 1 for `Raw`/`Text`, 0 for `Bit`.
    pub element_width: usize,
    /// Format tag as declared, kept verbatim for the fingerprint.
    pub format: Option<SmolStr>,
}

impl FieldDescriptor {
    /// Resolve a declared spec:
    /// bit flag → `Bit`; format → `Scalar`/`Raw`/`Text`; length 1 → `u8`;
    /// anything else → raw blob.
    pub fn resolve(spec: &FieldSpec, declared_index: usize) -> Result<Self, RegisterError> {
        if spec.length <= 0 {
            return Err(RegisterError::invalid_spec(
                &spec.name,
                format!("length must be greater than 0, got {}", spec.length),
            ));
        }
        let length = usize::try_from(spec.length).map_err(|_| {
            RegisterError::invalid_spec(&spec.name, format!("length {} does not fit this target", spec.length))
        })?;

        let (kind, element_width) = if spec.is_bit {
            (FieldKind::Bit, 0)
        } else if let Some(tag) = &spec.format {
            match FormatTag::parse(tag)? {
                FormatTag::Scalar(fmt) => (FieldKind::Scalar(fmt), fmt.width()),
                FormatTag::Raw => (FieldKind::Raw, 1),
                FormatTag::Text => (FieldKind::Text, 1),
            }
        } else if length == 1 {
            (FieldKind::Scalar(ScalarFormat::U8), 1)
        } else {
            (FieldKind::Raw, 1)
        };

        Ok(Self {
            name: spec.name.clone(),
            declared_index,
            kind,
            length,
            element_width,
            format: spec.format.clone(),
        })
    }

    /// Resolve a whole declaration, rejecting duplicate names.
    pub fn resolve_all(specs: &[FieldSpec]) -> Result<Vec<Self>, RegisterError> {
        let mut out: Vec<FieldDescriptor> = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if out.iter().any(|d| d.name == spec.name) {
                return Err(RegisterError::invalid_spec(&spec.name, "duplicate field name"));
            }
            out.push(Self::resolve(spec, i)?);
        }
        Ok(out)
    }

    #[inline]
    pub fn is_bit(&self) -> bool {
        self.kind.is_bit()
    }

    /// Bytes occupied by a byte field, saturating at `usize::MAX`.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.length.saturating_mul(self.element_width)
    }

    /// Toggle is only defined on single-bit flags.
    #[inline]
    pub fn is_toggleable(&self) -> bool {
        self.is_bit() && self.length == 1
    }

    /// Check a layout position against this descriptor's shape.
    pub(crate) fn fits(&self, pos: &PositionAssignment) -> bool {
        if self.is_bit() {
            pos.is_bits() && pos.bit_width as usize == self.length
        } else {
            !pos.is_bits()
                && pos.element_width == self.element_width
                && pos.array_length == self.length
        }
    }
}
