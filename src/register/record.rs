use smol_str::SmolStr;
use std::fmt;
use tracing::{debug, trace};

use super::Register;
use super::accessor::{FieldAccessor, FieldMut, FieldRef};
use crate::cache::LayoutCache;
use crate::error::RegisterError;
use crate::field::{FieldDescriptor, FieldSpec};
use crate::layout::{Fingerprint, Layout, Packing, compile};
use crate::store::{ByteStore, SharedStore};
use crate::types::FastMap;

/// Where a record's layout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutSource {
    Compiled,
    Cached,
}

impl fmt::Display for LayoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayoutSource::Compiled => "compiled",
            LayoutSource::Cached => "cached",
        })
    }
}

// ─── Record ─────────────────────────────────────────────────────────────────

/// A named window `[start_offset, start_offset + span)` over a shared byte
/// store, accessed field by field through a shadow buffer.
///
/// Field writes only touch the shadow buffer. `commit` is the single path to
/// the store and dropping a record never flushes it.
pub struct Record<S: ByteStore> {
    name: SmolStr,
    store: SharedStore<S>,
    start_offset: usize,
    shadow: Vec<u8>,
    layout: Layout,
    fingerprint: Fingerprint,
    source: LayoutSource,
    fields: FastMap<SmolStr, FieldAccessor>,
}

impl<S: ByteStore> Record<S> {
    /// Build a bits-first record. The layout is taken from `cache` when it
    /// holds one for exactly this declaration, otherwise compiled and stored.
    pub fn new(
        name: &str,
        store: SharedStore<S>,
        start_offset: usize,
        span: usize,
        specs: &[FieldSpec],
        cache: &mut LayoutCache,
    ) -> Result<Self, RegisterError> {
        Self::with_packing(name, store, start_offset, span, specs, Packing::default(), cache)
    }

    pub fn with_packing(
        name: &str,
        store: SharedStore<S>,
        start_offset: usize,
        span: usize,
        specs: &[FieldSpec],
        packing: Packing,
        cache: &mut LayoutCache,
    ) -> Result<Self, RegisterError> {
        let descriptors = FieldDescriptor::resolve_all(specs)?;
        check_window(&store, start_offset, span)?;

        let fingerprint = Fingerprint::compute(packing.scheme_tag(), &descriptors, start_offset, span);
        let (layout, source) = match cache
            .get(name, fingerprint)
            .and_then(|cached| cached.conform(&descriptors, span))
        {
            Some(layout) => (layout, LayoutSource::Cached),
            None => {
                let layout = compile(&descriptors, span, packing)?;
                cache.put(name, &layout, fingerprint);
                (layout, LayoutSource::Compiled)
            }
        };

        Self::from_parts(name, store, start_offset, span, descriptors, layout, fingerprint, source)
    }

    /// Bind resolved descriptors to a layout and load the shadow buffer.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        name: &str,
        store: SharedStore<S>,
        start_offset: usize,
        span: usize,
        descriptors: Vec<FieldDescriptor>,
        layout: Layout,
        fingerprint: Fingerprint,
        source: LayoutSource,
    ) -> Result<Self, RegisterError> {
        let mut fields = FastMap::default();
        for descriptor in descriptors {
            let position = *layout
                .get(&descriptor.name)
                .ok_or_else(|| RegisterError::invalid_spec(&descriptor.name, "missing from layout"))?;
            fields.insert(descriptor.name.clone(), FieldAccessor::new(descriptor, position));
        }

        let mut record = Self {
            name: SmolStr::new(name),
            store,
            start_offset,
            shadow: vec![0u8; span],
            layout,
            fingerprint,
            source,
            fields,
        };
        record.reload()?;
        debug!(
            record = name,
            start_offset,
            span,
            fields = record.fields.len(),
            source = %source,
            "record ready"
        );
        Ok(record)
    }

    #[inline]
    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    #[inline]
    pub fn span(&self) -> usize {
        self.shadow.len()
    }

    #[inline]
    pub fn layout_source(&self) -> LayoutSource {
        self.source
    }

    #[inline]
    pub fn store(&self) -> &SharedStore<S> {
        &self.store
    }

    #[inline]
    pub(crate) fn shadow_mut(&mut self) -> &mut [u8] {
        &mut self.shadow
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.layout.positions.iter().map(|(name, _)| name.as_str())
    }

    fn unknown(field: &str) -> RegisterError {
        RegisterError::UnknownField(SmolStr::new(field))
    }
}

pub(super) fn check_window<S: ByteStore>(
    store: &SharedStore<S>,
    start_offset: usize,
    span: usize,
) -> Result<(), RegisterError> {
    let store = store.borrow();
    store
        .check_bounds(start_offset, span)
        .map_err(|_| RegisterError::WindowOutOfBounds {
            start: start_offset,
            span,
            store_len: store.len(),
        })
}

impl<S: ByteStore> Register for Record<S> {
    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    #[inline]
    fn shadow(&self) -> &[u8] {
        &self.shadow
    }

    fn field(&self, field: &str) -> Result<FieldRef<'_>, RegisterError> {
        let accessor = self.fields.get(field).ok_or_else(|| Self::unknown(field))?;
        Ok(FieldRef {
            accessor,
            window: accessor.window(&self.shadow),
        })
    }

    fn field_mut(&mut self, field: &str) -> Result<FieldMut<'_>, RegisterError> {
        let accessor = self.fields.get(field).ok_or_else(|| Self::unknown(field))?;
        Ok(FieldMut {
            accessor,
            window: accessor.window_mut(&mut self.shadow),
        })
    }

    fn commit(&mut self) -> Result<(), RegisterError> {
        self.store.borrow_mut().write(self.start_offset, &self.shadow)?;
        debug!(record = %self.name, start_offset = self.start_offset, span = self.shadow.len(), "committed");
        // read back whatever the store actually kept
        self.reload()
    }

    fn reload(&mut self) -> Result<(), RegisterError> {
        self.store.borrow().read(self.start_offset, &mut self.shadow)?;
        trace!(record = %self.name, "reloaded");
        Ok(())
    }
}

impl<S: ByteStore> fmt::Display for Record<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} @ {}..{} ({} layout, fingerprint {})",
            self.name,
            self.start_offset,
            self.start_offset + self.shadow.len(),
            self.source,
            self.fingerprint
        )?;
        for (name, pos) in &self.layout.positions {
            let Some(accessor) = self.fields.get(name) else {
                continue;
            };
            let value = accessor.read(accessor.window(&self.shadow));
            if pos.is_bits() {
                writeln!(
                    f,
                    "  {name:<12} byte {:>3} bits {}..{}  = {value}",
                    pos.byte_offset,
                    pos.bit_offset,
                    pos.bit_offset + pos.bit_width
                )?;
            } else {
                writeln!(
                    f,
                    "  {name:<12} byte {:>3} len {:<4} = {value}",
                    pos.byte_offset,
                    pos.byte_len()
                )?;
            }
        }
        Ok(())
    }
}

impl<S: ByteStore> fmt::Debug for Record<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("name", &self.name)
            .field("start_offset", &self.start_offset)
            .field("span", &self.shadow.len())
            .field("fingerprint", &self.fingerprint)
            .field("source", &self.source)
            .finish()
    }
}
