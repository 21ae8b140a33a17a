use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use xxhash_rust::xxh64::xxh64;

use super::Register;
use super::accessor::{FieldMut, FieldRef};
use super::record::{LayoutSource, Record, check_window};
use crate::cache::LayoutCache;
use crate::error::RegisterError;
use crate::field::{FieldDescriptor, FieldSpec};
use crate::layout::{Fingerprint, Layout};
use crate::store::{ByteStore, SharedStore};
use crate::types::*;

/// Scheme tag mixed into indexed-register fingerprints; packed records use
/// the `Packing` tags below it.
const INDEXED_SCHEME: u8 = 2;

/// One field of an indexed bit register: `width` bits starting at bit
/// `position` of the word (bit 0 = least significant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitField {
    pub name: SmolStr,
    pub position: u8,
    pub width: u8,
}

impl BitField {
    pub fn new(name: &str, position: u8, width: u8) -> Self {
        Self {
            name: SmolStr::new(name),
            position,
            width,
        }
    }
}

impl From<(&str, u8, u8)> for BitField {
    fn from((name, position, width): (&str, u8, u8)) -> Self {
        Self::new(name, position, width)
    }
}

// ─── BitRegister ────────────────────────────────────────────────────────────

/// A register word of 8, 16 or 32 bits whose fields sit at explicit bit
/// positions, the way hardware reference manuals describe them.
///
/// The word is stored little-endian and committed as a whole.
pub struct BitRegister<S: ByteStore> {
    inner: Record<S>,
    bits: usize,
}

impl<S: ByteStore> BitRegister<S> {
    pub fn new(
        name: &str,
        store: SharedStore<S>,
        start_offset: usize,
        bits: usize,
        fields: &[BitField],
        cache: &mut LayoutCache,
    ) -> Result<Self, RegisterError> {
        if !matches!(bits, 8 | 16 | MAX_REGISTER_BITS) {
            return Err(RegisterError::InvalidSpan(bits));
        }
        let span = bits / 8;

        let specs: Vec<FieldSpec> = fields
            .iter()
            .map(|f| FieldSpec::bit(&f.name, f.width as i64))
            .collect();
        let descriptors = FieldDescriptor::resolve_all(&specs)?;
        check_fields(fields, bits)?;
        check_window(&store, start_offset, span)?;

        let fingerprint = indexed_fingerprint(&descriptors, fields, start_offset, span);
        let (layout, source) = match cache
            .get(name, fingerprint)
            .and_then(|cached| cached.conform(&descriptors, span))
        {
            Some(layout) => (layout, LayoutSource::Cached),
            None => {
                let layout = Layout {
                    extent: span,
                    positions: fields
                        .iter()
                        .map(|f| (f.name.clone(), PositionAssignment::bits(0, f.position, f.width)))
                        .collect(),
                };
                cache.put(name, &layout, fingerprint);
                (layout, LayoutSource::Compiled)
            }
        };

        let inner = Record::from_parts(name, store, start_offset, span, descriptors, layout, fingerprint, source)?;
        Ok(Self { inner, bits })
    }

    #[inline]
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// The shadow word.
    pub fn word(&self) -> u32 {
        self.inner
            .shadow()
            .iter()
            .enumerate()
            .fold(0u32, |w, (i, b)| w | ((*b as u32) << (8 * i)))
    }

    /// Replace the whole shadow word; bits above the register width are
    /// rejected.
    pub fn set_word(&mut self, word: u32) -> Result<(), RegisterError> {
        if self.bits < 32 && word >> self.bits != 0 {
            return Err(RegisterError::InvalidBitWidth {
                field: self.inner_name(),
                value: word as u64,
                width: self.bits as u8,
            });
        }
        let bytes = word.to_le_bytes();
        let span = self.inner.span();
        self.inner.shadow_mut().copy_from_slice(&bytes[..span]);
        Ok(())
    }

    #[inline]
    pub fn layout_source(&self) -> LayoutSource {
        self.inner.layout_source()
    }

    fn inner_name(&self) -> SmolStr {
        SmolStr::new(self.inner.name())
    }
}

/// Every field must fit the word and claim its own bits.
fn check_fields(fields: &[BitField], bits: usize) -> Result<(), RegisterError> {
    let mut claimed = 0u64;
    for f in fields {
        let end = f.position as usize + f.width as usize;
        if end > bits {
            return Err(RegisterError::RecordTooSmall {
                required: end.div_ceil(8),
                span: bits / 8,
            });
        }
        let mask = ((1u64 << f.width) - 1) << f.position;
        if claimed & mask != 0 {
            return Err(RegisterError::invalid_spec(
                &f.name,
                format!("bits {}..{end} overlap another field", f.position),
            ));
        }
        claimed |= mask;
    }
    Ok(())
}

/// Declaration fingerprint extended with each field's bit position.
fn indexed_fingerprint(
    descriptors: &[FieldDescriptor],
    fields: &[BitField],
    start_offset: usize,
    span: usize,
) -> Fingerprint {
    let base = Fingerprint::compute(INDEXED_SCHEME, descriptors, start_offset, span);
    let mut buf = Vec::with_capacity(8 + fields.len());
    buf.extend_from_slice(&base.0.to_le_bytes());
    buf.extend(fields.iter().map(|f| f.position));
    Fingerprint(xxh64(&buf, 0))
}

impl<S: ByteStore> Register for BitRegister<S> {
    #[inline]
    fn name(&self) -> &str {
        self.inner.name()
    }

    #[inline]
    fn layout(&self) -> &Layout {
        self.inner.layout()
    }

    #[inline]
    fn fingerprint(&self) -> Fingerprint {
        self.inner.fingerprint()
    }

    #[inline]
    fn shadow(&self) -> &[u8] {
        self.inner.shadow()
    }

    #[inline]
    fn field(&self, field: &str) -> Result<FieldRef<'_>, RegisterError> {
        self.inner.field(field)
    }

    #[inline]
    fn field_mut(&mut self, field: &str) -> Result<FieldMut<'_>, RegisterError> {
        self.inner.field_mut(field)
    }

    fn commit(&mut self) -> Result<(), RegisterError> {
        self.inner.commit()
    }

    fn reload(&mut self) -> Result<(), RegisterError> {
        self.inner.reload()
    }
}

impl<S: ByteStore> fmt::Display for BitRegister<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:#0width$x} ", self.inner.name(), self.word(), width = self.bits / 4 + 2)?;
        write!(f, "{}", self.inner)
    }
}
