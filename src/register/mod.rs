pub mod accessor;
pub mod bit_register;
pub mod record;

pub use accessor::{FieldAccessor, FieldMut, FieldRef};
pub use bit_register::{BitField, BitRegister};
pub use record::{LayoutSource, Record};

use crate::error::RegisterError;
use crate::layout::{Fingerprint, Layout};
use crate::value::FieldValue;

/// Common surface of every register variant: a named window over a byte
/// store, a resolved layout and a shadow buffer that only reaches the store
/// on `commit`.
///
/// Implementors supply the field lookups and the store round trip; reading,
/// writing and toggling by name are built on top of them.
pub trait Register {
    fn name(&self) -> &str;
    fn layout(&self) -> &Layout;
    fn fingerprint(&self) -> Fingerprint;

    /// The in-memory copy of the window.
    fn shadow(&self) -> &[u8];

    /// Look up `field`; `UnknownField` if it was never declared.
    fn field(&self, field: &str) -> Result<FieldRef<'_>, RegisterError>;
    fn field_mut(&mut self, field: &str) -> Result<FieldMut<'_>, RegisterError>;

    /// Write the whole shadow buffer to the store, then re-read it.
    fn commit(&mut self) -> Result<(), RegisterError>;
    /// Overwrite the shadow buffer with what the store holds now.
    fn reload(&mut self) -> Result<(), RegisterError>;

    #[inline]
    fn get(&self, field: &str) -> Result<FieldValue, RegisterError> {
        Ok(self.field(field)?.read())
    }

    /// Dyn-compatible form of [`Register::set`].
    fn set_value(&mut self, field: &str, value: FieldValue) -> Result<(), RegisterError> {
        self.field_mut(field)?.write(value)
    }

    /// Write a field in the shadow buffer. Nothing reaches the store until
    /// `commit`.
    #[inline]
    fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), RegisterError>
    where
        Self: Sized,
    {
        self.set_value(field, value.into())
    }

    /// Flip a single-bit flag in the shadow buffer.
    fn toggle(&mut self, field: &str) -> Result<(), RegisterError> {
        self.field_mut(field)?.toggle()
    }
}
