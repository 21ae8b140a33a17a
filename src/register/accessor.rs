use crate::codec::*;
use crate::error::RegisterError;
use crate::field::FieldDescriptor;
use crate::types::*;
use crate::value::FieldValue;

// ─── FieldAccessor ──────────────────────────────────────────────────────────

/// A field's descriptor bound to its resolved position.
///
/// All methods work on the field's window, the `byte_len()` bytes starting
/// at `position.byte_offset` in the shadow buffer; bit offsets are relative
/// to that window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessor {
    pub descriptor: FieldDescriptor,
    pub position: PositionAssignment,
}

impl FieldAccessor {
    pub fn new(descriptor: FieldDescriptor, position: PositionAssignment) -> Self {
        Self {
            descriptor,
            position,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    #[inline]
    pub fn window<'a>(&self, shadow: &'a [u8]) -> &'a [u8] {
        &shadow[self.position.byte_offset..self.position.end()]
    }

    #[inline]
    pub fn window_mut<'a>(&self, shadow: &'a mut [u8]) -> &'a mut [u8] {
        &mut shadow[self.position.byte_offset..self.position.end()]
    }

    pub fn read(&self, window: &[u8]) -> FieldValue {
        let pos = &self.position;
        match self.descriptor.kind {
            FieldKind::Bit => FieldValue::Bits(read_bits(window, pos.bit_offset, pos.bit_width)),
            FieldKind::Scalar(fmt) if pos.array_length == 1 => decode_scalar(fmt, window),
            FieldKind::Scalar(fmt) => FieldValue::Array(
                window
                    .chunks_exact(pos.element_width)
                    .map(|chunk| decode_scalar(fmt, chunk))
                    .collect(),
            ),
            FieldKind::Raw => FieldValue::Bytes(window.to_vec()),
            FieldKind::Text => FieldValue::Text(decode_text(window)),
        }
    }

    /// Encode `value` into the window. On error the window is unchanged.
    pub fn write(&self, window: &mut [u8], value: &FieldValue) -> Result<(), RegisterError> {
        let name = &self.descriptor.name;
        match self.descriptor.kind {
            FieldKind::Bit => {
                let v = match value {
                    FieldValue::Bits(_) | FieldValue::UInt(_) | FieldValue::Int(_) => {
                        value.as_u64().ok_or_else(|| RegisterError::TypeMismatch {
                            field: name.clone(),
                            expected: "non-negative integer",
                        })?
                    }
                    _ => {
                        return Err(RegisterError::TypeMismatch {
                            field: name.clone(),
                            expected: "integer or bool",
                        });
                    }
                };
                let width = self.position.bit_width;
                if bits_needed(v) > width as u32 {
                    return Err(RegisterError::InvalidBitWidth {
                        field: name.clone(),
                        value: v,
                        width,
                    });
                }
                write_bits(window, self.position.bit_offset, width, v as u32);
                Ok(())
            }
            FieldKind::Scalar(fmt) => self.write_scalars(window, fmt, value),
            FieldKind::Raw | FieldKind::Text => {
                let bytes = value.as_bytes().ok_or_else(|| RegisterError::TypeMismatch {
                    field: name.clone(),
                    expected: "bytes or text",
                })?;
                write_blob(name, window, bytes)
            }
        }
    }

    fn write_scalars(
        &self,
        window: &mut [u8],
        fmt: ScalarFormat,
        value: &FieldValue,
    ) -> Result<(), RegisterError> {
        let name = &self.descriptor.name;
        let width = self.position.element_width;
        let items: &[FieldValue] = match value {
            FieldValue::Array(items) => items,
            single => std::slice::from_ref(single),
        };
        if items.len() > self.position.array_length {
            return Err(RegisterError::ValueTooLong {
                field: name.clone(),
                capacity: self.position.array_length,
                actual: items.len(),
            });
        }

        // encode everything before touching the window
        let mut encoded = vec![0u8; window.len()];
        for (item, chunk) in items.iter().zip(encoded.chunks_exact_mut(width)) {
            chunk.copy_from_slice(&encode_scalar(name, fmt, item)?);
        }
        window.copy_from_slice(&encoded);
        Ok(())
    }

    /// Flip a single-bit flag in place.
    pub fn toggle(&self, window: &mut [u8]) -> Result<(), RegisterError> {
        if !self.descriptor.is_toggleable() {
            return Err(RegisterError::NotToggleable(self.descriptor.name.clone()));
        }
        let pos = &self.position;
        let bit = read_bits(window, pos.bit_offset, 1);
        write_bits(window, pos.bit_offset, 1, bit ^ 1);
        Ok(())
    }
}

// ─── Borrowed views ─────────────────────────────────────────────────────────

/// Read-only view of one field inside a record's shadow buffer.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    pub(crate) accessor: &'a FieldAccessor,
    pub(crate) window: &'a [u8],
}

impl<'a> FieldRef<'a> {
    #[inline]
    pub fn read(&self) -> FieldValue {
        self.accessor.read(self.window)
    }

    /// The bytes the field occupies (including neighbouring bits for bit fields).
    #[inline]
    pub fn raw(&self) -> &'a [u8] {
        self.window
    }

    #[inline]
    pub fn position(&self) -> &'a PositionAssignment {
        &self.accessor.position
    }

    #[inline]
    pub fn descriptor(&self) -> &'a FieldDescriptor {
        &self.accessor.descriptor
    }
}

/// Mutable view of one field inside a record's shadow buffer.
#[derive(Debug)]
pub struct FieldMut<'a> {
    pub(crate) accessor: &'a FieldAccessor,
    pub(crate) window: &'a mut [u8],
}

impl FieldMut<'_> {
    #[inline]
    pub fn read(&self) -> FieldValue {
        self.accessor.read(self.window)
    }

    pub fn write(&mut self, value: impl Into<FieldValue>) -> Result<(), RegisterError> {
        self.accessor.write(self.window, &value.into())
    }

    pub fn toggle(&mut self) -> Result<(), RegisterError> {
        self.accessor.toggle(self.window)
    }

    #[inline]
    pub fn position(&self) -> &PositionAssignment {
        &self.accessor.position
    }
}
