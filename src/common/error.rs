use thiserror::Error;

use super::types::{PageId, SlotId};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid row id: {0:?}")]
    InvalidRowId(String),

    #[error("null value in non-nullable column {0:?}")]
    NullInNonNullable(String),

    #[error("invalid value for column {column:?}: {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("expected {expected} values but got {got}")]
    SchemaMismatch { expected: usize, got: usize },

    #[error("disk is full ({0} pages)")]
    DiskFull(u32),

    #[error("tuple of {needed} bytes does not fit in {available} free bytes")]
    PageFull { needed: usize, available: usize },

    #[error("value of {got} bytes exceeds the declared maximum of {max} bytes")]
    ValueTooLarge { max: usize, got: usize },

    #[error("buffer pool exhausted: all {0} frames are pinned")]
    PoolExhausted(usize),

    #[error("table {0:?} not found")]
    UnknownTable(String),

    #[error("table {0:?} already exists")]
    AlreadyExists(String),

    #[error("page {0} is not allocated")]
    BadPage(PageId),

    #[error("slot {0} is out of range")]
    BadSlot(SlotId),

    #[error("slot {0} is a tombstone")]
    Tombstoned(SlotId),

    #[error("page {0} is still pinned")]
    PagePinned(PageId),

    #[error("tuple bytes truncated at offset {0}")]
    Truncated(usize),

    #[error("column {0:?} holds invalid UTF-8")]
    InvalidUtf8(String),

    #[error("storage invariant violated: {0}")]
    Corrupted(String),

    #[error("engine is poisoned and refuses further mutation")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, EngineError>;
