//! Projection of rows onto foreign key columns

use crate::error::{Error, Result};
use crate::meta::TableInfo;
use proven_value::{Value, encode_key};
use std::collections::HashSet;

/// Resolves constraint column names to their offsets in `table`'s rows.
pub fn column_offsets(table: &TableInfo, cols: &[String]) -> Result<Vec<usize>> {
    cols.iter()
        .map(|name| {
            table
                .column(name)
                .map(|c| c.offset)
                .ok_or_else(|| Error::UnknownColumn(format!("{}.{}", table.name, name)))
        })
        .collect()
}

/// Extracts constraint values from rows, remembering tuples already handled
/// by the current statement.
///
/// The set of seen tuples grows with the number of distinct values a
/// statement touches and is only released with the helper.
#[derive(Debug, Clone, Default)]
pub struct FkValueHelper {
    offsets: Vec<usize>,
    seen: HashSet<Vec<u8>>,
}

impl FkValueHelper {
    pub fn new(offsets: Vec<usize>) -> Self {
        Self {
            offsets,
            seen: HashSet::new(),
        }
    }

    /// Helper for the named columns of `table`.
    pub fn for_columns(table: &TableInfo, cols: &[String]) -> Result<Self> {
        Ok(Self::new(column_offsets(table, cols)?))
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Projects `row` onto the constraint columns.
    pub fn fetch_values(&self, row: &[Value]) -> Result<Vec<Value>> {
        self.offsets
            .iter()
            .map(|&offset| {
                row.get(offset).cloned().ok_or(Error::IndexOutOfBound {
                    offset,
                    len: row.len(),
                })
            })
            .collect()
    }

    pub fn has_null(values: &[Value]) -> bool {
        values.iter().any(Value::is_null)
    }

    /// Like [`fetch_values`](Self::fetch_values), but returns `None` for tuples
    /// containing NULL (they match nothing) and for tuples already returned.
    pub fn fetch_values_deduped(&mut self, row: &[Value]) -> Result<Option<Vec<Value>>> {
        let values = self.fetch_values(row)?;
        if Self::has_null(&values) {
            return Ok(None);
        }
        let encoded = encode_key(&values)?;
        if !self.seen.insert(encoded) {
            return Ok(None);
        }
        Ok(Some(values))
    }

    /// Number of distinct tuples returned so far.
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }
}
