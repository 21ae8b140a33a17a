// ─── Error ──────────────────────────────────────────────────────────────────
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("invalid field spec `{field}`: {reason}")]
    InvalidFieldSpec { field: SmolStr, reason: String },
    #[error("unsupported format tag `{0}`")]
    UnsupportedFormat(SmolStr),
    #[error("layout needs {required} bytes but the record span is {span}")]
    RecordTooSmall { required: usize, span: usize },
    #[error("value {value} does not fit the {width}-bit field `{field}`")]
    InvalidBitWidth { field: SmolStr, value: u64, width: u8 },
    #[error("value of {actual} bytes exceeds the {capacity}-byte field `{field}`")]
    ValueTooLong {
        field: SmolStr,
        capacity: usize,
        actual: usize,
    },
    #[error("field `{0}` is not a single-bit flag, cannot toggle")]
    NotToggleable(SmolStr),
    #[error("unknown field `{0}`")]
    UnknownField(SmolStr),
    #[error("type mismatch on `{field}`: expected {expected}")]
    TypeMismatch { field: SmolStr, expected: &'static str },
    #[error("value {value} is out of range for `{field}`")]
    ValueOutOfRange { field: SmolStr, value: String },
    #[error("window {start}..{start}+{span} exceeds the {store_len}-byte store")]
    WindowOutOfBounds {
        start: usize,
        span: usize,
        store_len: usize,
    },
    #[error("bit register span must be 8, 16 or 32 bits, got {0}")]
    InvalidSpan(usize),
    #[error("byte store error: {0}")]
    Store(#[from] StoreError),
    #[error("declaration error: {0}")]
    Config(String),
}

impl RegisterError {
    pub(crate) fn invalid_spec(field: &str, reason: impl Into<String>) -> Self {
        RegisterError::InvalidFieldSpec {
            field: SmolStr::new(field),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for RegisterError {
    fn from(e: serde_json::Error) -> Self {
        RegisterError::Config(e.to_string())
    }
}

// ─── Byte store errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("access {offset}+{len} is outside the {store_len}-byte store")]
    OutOfBounds {
        offset: usize,
        len: usize,
        store_len: usize,
    },
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Redb(e.into())
    }
}

// ─── Cache errors (logged and swallowed by LayoutCache) ─────────────────────

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CBOR error: {0}")]
    Cbor(String),
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),
}

impl From<redb::TransactionError> for CacheError {
    fn from(e: redb::TransactionError) -> Self {
        CacheError::Redb(e.into())
    }
}

impl From<redb::TableError> for CacheError {
    fn from(e: redb::TableError) -> Self {
        CacheError::Redb(e.into())
    }
}

impl From<redb::CommitError> for CacheError {
    fn from(e: redb::CommitError) -> Self {
        CacheError::Redb(e.into())
    }
}

impl From<redb::StorageError> for CacheError {
    fn from(e: redb::StorageError) -> Self {
        CacheError::Redb(e.into())
    }
}

impl From<redb::DatabaseError> for CacheError {
    fn from(e: redb::DatabaseError) -> Self {
        CacheError::Redb(e.into())
    }
}
