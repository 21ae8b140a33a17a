use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;
use xxhash_rust::xxh64::xxh64;

use crate::error::RegisterError;
use crate::field::FieldDescriptor;
use crate::types::*;

// ─── Packing ────────────────────────────────────────────────────────────────

/// Placement order. The byte order produced here is what other firmware
/// reads, so both strategies must stay bit-exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packing {
    /// All bit fields first, then byte fields, each group in declaration order.
    #[default]
    BitsFirst,
    /// Strict declaration order; a byte field after bits starts a fresh byte.
    Declared,
}

impl Packing {
    pub(crate) fn scheme_tag(self) -> u8 {
        match self {
            Packing::BitsFirst => 0,
            Packing::Declared => 1,
        }
    }
}

// ─── Fingerprint ────────────────────────────────────────────────────────────

/// Stable structural hash of a declaration and its placement.
///
/// Persisted as 16 hex digits so readers that parse numbers as doubles keep
/// every bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Num(u64),
        }
        match Repr::deserialize(de)? {
            Repr::Hex(s) => u64::from_str_radix(&s, 16)
                .map(Fingerprint)
                .map_err(serde::de::Error::custom),
            Repr::Num(n) => Ok(Fingerprint(n)),
        }
    }
}

impl Fingerprint {
    /// xxh64 over a canonical little-endian encoding of the scheme tag, every
    /// field in declaration order, `start_offset` and `span`.
    pub fn compute(scheme: u8, fields: &[FieldDescriptor], start_offset: usize, span: usize) -> Self {
        let mut buf: Vec<u8> = Vec::with_capacity(16 + fields.len() * 24);
        buf.push(scheme);
        buf.extend_from_slice(&(fields.len() as u32).to_le_bytes());
        for f in fields {
            buf.extend_from_slice(&(f.name.len() as u32).to_le_bytes());
            buf.extend_from_slice(f.name.as_bytes());
            buf.extend_from_slice(&(f.length as u64).to_le_bytes());
            buf.push(f.kind.tag_byte());
            match &f.format {
                Some(tag) => {
                    buf.push(1);
                    buf.extend_from_slice(&(tag.len() as u32).to_le_bytes());
                    buf.extend_from_slice(tag.as_bytes());
                }
                None => buf.push(0),
            }
        }
        buf.extend_from_slice(&(start_offset as u64).to_le_bytes());
        buf.extend_from_slice(&(span as u64).to_le_bytes());
        Fingerprint(xxh64(&buf, 0))
    }
}

// ─── Layout ─────────────────────────────────────────────────────────────────

/// Resolved position of every field, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Bytes actually used by the fields (`<= span`).
    pub extent: usize,
    #[serde(deserialize_with = "deserialize_positions")]
    pub positions: Vec<(SmolStr, PositionAssignment)>,
}

impl Layout {
    pub fn get(&self, name: &str) -> Option<&PositionAssignment> {
        self.positions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Re-check a layout that came from outside the compiler (the cache)
    /// against the declaration it claims to describe. Positions are put back
    /// in declaration order; any mismatch in names, shapes, bit windows or
    /// extent, or two fields claiming the same bit, yields `None`.
    pub fn conform(self, fields: &[FieldDescriptor], span: usize) -> Option<Layout> {
        if self.positions.len() != fields.len() || self.extent > span {
            return None;
        }
        let mut by_name: BTreeMap<SmolStr, PositionAssignment> = BTreeMap::new();
        for (name, pos) in self.positions {
            if by_name.insert(name, pos).is_some() {
                return None;
            }
        }
        let mut positions = Vec::with_capacity(fields.len());
        for f in fields {
            let pos = by_name.remove(&f.name)?;
            if !f.fits(&pos) || pos.checked_end()? > span {
                return None;
            }
            if pos.is_bits() {
                let covered = (pos.bit_offset as usize + pos.bit_width as usize).div_ceil(8);
                if pos.element_width != covered || covered * 8 > MAX_REGISTER_BITS {
                    return None;
                }
            }
            positions.push((f.name.clone(), pos));
        }
        if overlapping(&positions) {
            return None;
        }
        Some(Layout {
            extent: self.extent,
            positions,
        })
    }
}

/// Positions may arrive as a list of `[name, position]` pairs (the written
/// form) or as a `{name: position}` map; `Layout::conform` restores order.
fn deserialize_positions<'de, D>(de: D) -> Result<Vec<(SmolStr, PositionAssignment)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PositionsRepr {
        Pairs(Vec<(SmolStr, PositionAssignment)>),
        Map(BTreeMap<SmolStr, PositionAssignment>),
    }

    Ok(match PositionsRepr::deserialize(de)? {
        PositionsRepr::Pairs(pairs) => pairs,
        PositionsRepr::Map(map) => map.into_iter().collect(),
    })
}

/// True when two positions claim a common bit of the window.
fn overlapping(positions: &[(SmolStr, PositionAssignment)]) -> bool {
    let mut ranges: Vec<(u64, u64)> = positions
        .iter()
        .map(|(_, p)| {
            let base = p.byte_offset as u64 * 8;
            if p.is_bits() {
                let start = base + p.bit_offset as u64;
                (start, start + p.bit_width as u64)
            } else {
                (base, base + p.byte_len() as u64 * 8)
            }
        })
        .collect();
    ranges.sort_unstable();
    ranges.windows(2).any(|w| w[1].0 < w[0].1)
}

// ─── Compiler ───────────────────────────────────────────────────────────────

/// Lay `fields` out over a window of `span` bytes.
pub fn compile(fields: &[FieldDescriptor], span: usize, packing: Packing) -> Result<Layout, RegisterError> {
    for f in fields.iter().filter(|f| f.is_bit()) {
        if f.length > MAX_PACKED_BIT_WIDTH as usize {
            return Err(RegisterError::invalid_spec(
                &f.name,
                format!("bit fields are at most {MAX_PACKED_BIT_WIDTH} bits wide"),
            ));
        }
    }

    let mut cursor = Cursor::default();
    let mut slots: Vec<Option<PositionAssignment>> = vec![None; fields.len()];

    match packing {
        Packing::BitsFirst => {
            // 1. bit fields, declaration order
            for (i, f) in fields.iter().enumerate().filter(|(_, f)| f.is_bit()) {
                slots[i] = Some(cursor.place_bits(f.length as u8));
            }
            // 2. close the bit byte(s)
            cursor.align();
            // 3. byte fields, declaration order
            for (i, f) in fields.iter().enumerate().filter(|(_, f)| !f.is_bit()) {
                slots[i] = Some(cursor.place_bytes(f));
            }
        }
        Packing::Declared => {
            for (i, f) in fields.iter().enumerate() {
                slots[i] = Some(if f.is_bit() {
                    cursor.place_bits(f.length as u8)
                } else {
                    cursor.align();
                    cursor.place_bytes(f)
                });
            }
            cursor.align();
        }
    }

    if cursor.byte > span {
        return Err(RegisterError::RecordTooSmall {
            required: cursor.byte,
            span,
        });
    }

    let positions = fields
        .iter()
        .zip(slots)
        .filter_map(|(f, slot)| slot.map(|p| (f.name.clone(), p)))
        .collect::<Vec<_>>();
    trace!(fields = positions.len(), extent = cursor.byte, ?packing, "layout compiled");

    Ok(Layout {
        extent: cursor.byte,
        positions,
    })
}

#[derive(Debug, Default)]
struct Cursor {
    byte: usize,
    bit: usize,
}

impl Cursor {
    #[inline]
    fn place_bits(&mut self, width: u8) -> PositionAssignment {
        if self.bit >= 8 {
            self.byte = self.byte.saturating_add(1);
            self.bit %= 8;
        }
        let pos = PositionAssignment::bits(self.byte, self.bit as u8, width);
        self.bit += width as usize;
        pos
    }

    /// Move past any partially used bit byte. A field that ran past bit 7
    /// covers the next byte as well, so skip every byte it touched.
    #[inline]
    fn align(&mut self) {
        if self.bit > 0 {
            self.byte = self.byte.saturating_add(self.bit.div_ceil(8));
            self.bit = 0;
        }
    }

    /// Saturates, so an oversized declaration surfaces as `RecordTooSmall`.
    #[inline]
    fn place_bytes(&mut self, f: &FieldDescriptor) -> PositionAssignment {
        let pos = PositionAssignment::bytes(self.byte, f.element_width, f.length);
        self.byte = self.byte.saturating_add(f.byte_size());
        pos
    }
}
