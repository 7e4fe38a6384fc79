//! Error types for foreign key checks and cascades

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Constraint errors
    #[error("Foreign key violation on `{constraint}`: {detail}")]
    ForeignKeyViolation { constraint: String, detail: String },

    // Schema resolution errors
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("No index on `{table}` covers foreign key columns ({columns})")]
    IndexNotFound { table: String, columns: String },

    #[error("Index column offset {offset} out of bound, row has {len} columns")]
    IndexOutOfBound { offset: usize, len: usize },

    // Key construction errors
    #[error("Encoding error: {0}")]
    Encoding(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock wait timeout exceeded")]
    LockWaitTimeout,

    #[error("Deadlock detected")]
    Deadlock,

    #[error("Query execution was interrupted")]
    Interrupted,

    // Cascade errors
    #[error("Foreign key cascade {0} is not supported")]
    UnsupportedCascade(String),

    #[error("Generate foreign key cascade sql failed: {0}")]
    CascadeGeneration(String),

    #[error("Compile error: {0}")]
    Compile(String),
}

impl Error {
    /// Whether the error is an existence assertion failure, the only error the
    /// tolerant batch path downgrades to a warning.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::ForeignKeyViolation { .. })
    }
}

impl From<proven_value::Error> for Error {
    fn from(e: proven_value::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}
