//! Proven Value - Universal value type for Proven database components
//!
//! This crate provides the scalar Value type carried by DML rows and the
//! memcomparable encoding used to turn value tuples into storage keys.

pub mod encoding;
pub mod types;

pub use encoding::{Error, Result, encode_key};
pub use types::{DataType, Row, Value};
