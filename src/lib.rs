pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod field;
pub mod layout;
pub mod register;
pub mod store;
pub mod types;
pub mod value;

pub use cache::LayoutCache;
pub use config::{CacheConfig, Declaration};
pub use error::{RegisterError, StoreError};
pub use field::{FieldDescriptor, FieldSpec};
pub use layout::{Fingerprint, Layout, Packing, compile};
pub use register::{BitField, BitRegister, LayoutSource, Record, Register};
pub use store::{ByteStore, MemStore, NvsStore, SharedStore, shared};
pub use types::{FieldKind, PositionAssignment, ScalarFormat};
pub use value::FieldValue;
