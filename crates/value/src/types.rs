//! Value types for Proven database
//!
//! Scalar representation of a single column value as it flows through DML
//! row processing and foreign key checks.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row of values, one per table column in offset order
pub type Row = Vec<Value>;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    I64,
    U64,
    F32,
    F64,
    Decimal,
    Str,
    Bytea,
    Date,
    Timestamp,
}

impl DataType {
    /// Integer columns can back an integer row handle
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::I64 | DataType::U64)
    }
}

/// Universal value type for Proven database components
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    // Null
    Null,
    // Integer types
    I64(i64),
    U64(u64),
    // Float types
    F32(f32),
    F64(f64),
    // Decimal
    Decimal(Decimal),
    // String
    Str(String),
    // Binary
    Bytea(Vec<u8>),
    // Date/Time types
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create a string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::Str(s.into())
    }

    /// Create bytes value
    pub fn bytes(b: Vec<u8>) -> Self {
        Value::Bytea(b)
    }

    // ========================================================================
    // Type Checks
    // ========================================================================

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is any integer type
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::I64(_) | Value::U64(_))
    }

    /// Check if value is a float type
    pub fn is_float(&self) -> bool {
        matches!(self, Value::F32(_) | Value::F64(_))
    }

    /// Check if value is numeric (integer, float, or decimal)
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || matches!(self, Value::Decimal(_))
    }

    /// Integer view of the value. Unsigned values are reinterpreted bit-for-bit,
    /// which is how unsigned integer handles are stored.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            Value::U64(u) => Some(*u as i64),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::Str(_) => "string",
            Value::Bytea(_) => "bytea",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::I64(i) => write!(f, "I64({:?})", i),
            Value::U64(u) => write!(f, "U64({:?})", u),
            Value::F32(fl) => write!(f, "F32({:?})", fl),
            Value::F64(fl) => write!(f, "F64({:?})", fl),
            Value::Decimal(d) => write!(f, "Decimal({})", d),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Bytea(b) => write!(f, "Bytea({} bytes)", b.len()),
            Value::Date(d) => write!(f, "Date({})", d),
            Value::Timestamp(ts) => write!(f, "Timestamp({})", ts),
        }
    }
}

/// Renders the value's textual form. Strings and bytes render unquoted.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::I64(i) => write!(f, "{}", i),
            Value::U64(u) => write!(f, "{}", u),
            Value::F32(fl) => write!(f, "{}", fl),
            Value::F64(fl) => write!(f, "{}", fl),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytea(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}
