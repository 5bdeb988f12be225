//! Error types for particle-db
//!
//! Every fallible operation returns a structured error; the store never
//! logs-and-swallows on the library path and never terminates the process.
//! Best-effort policies (keep going past a corrupt file mid-batch) compose
//! above this layer.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Particle-db error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow layer error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Storage error (Parquet encode/decode, manifest)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Column set of appended rows does not match the existing table
    #[error("Schema mismatch: table has columns {expected:?}, appended rows have {found:?}")]
    SchemaMismatch {
        /// Column names already present in the table
        expected: Vec<String>,
        /// Column names supplied by the append
        found: Vec<String>,
    },

    /// Lookup of a column name that is not present
    #[error("No column named `{0}`")]
    ColumnNotFound(String),

    /// Column value count does not match the table's row count
    #[error("Column `{column}` has {found} values, table has {expected} rows")]
    LengthMismatch {
        /// Column being written
        column: String,
        /// Row count of the table
        expected: usize,
        /// Value count supplied
        found: usize,
    },

    /// Tracking data in a shape the store does not accept
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// A value could not be coerced to the requested column type
    #[error("Cannot coerce column `{column}`: {reason}")]
    TypeCoercion {
        /// Column being coerced
        column: String,
        /// Value-level cause
        reason: String,
    },

    /// Operation needs the frame key as the table index
    #[error("`{operation}` requires the table to be frame-indexed; call set_frame_index() first")]
    FrameIndexRequired {
        /// Operation that was attempted
        operation: &'static str,
    },
}
