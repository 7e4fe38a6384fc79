//! Record and index key layout
//!
//! Record key: `t{table_id}_r{handle}`
//! Index key:  `t{table_id}_i{index_id}{encoded values}[{handle}]`
//!
//! Integer ids and int handles are 8 sign-flipped big-endian bytes, so keys of
//! one table sort by handle. A common handle is the memcomparable encoding of
//! the primary key values. Entries of unique indexes on non-null values end
//! after the values and store the handle as their value; all other index
//! entries append the handle to the key and store [`INDEX_PLACEHOLDER`].

use crate::error::{Error, Result};
use crate::kv::Key;
use crate::meta::{IndexInfo, MatchKey, TableId, TableInfo};
use proven_value::Value;
use proven_value::encoding::{INT_FLAG, cut_one, decode_int, encode_int, encode_key_into};
use std::fmt;

const TABLE_PREFIX: u8 = b't';
const RECORD_SEP: &[u8] = b"_r";
const INDEX_SEP: &[u8] = b"_i";
/// Length of `t{table_id}_r` and `t{table_id}_i`
const TABLE_SEP_LEN: usize = 1 + 8 + 2;

/// Value stored for index entries that carry the handle in their key
pub const INDEX_PLACEHOLDER: &[u8] = b"0";

/// Row identifier within a table
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Handle {
    Int(i64),
    /// Memcomparable encoding of the primary key values
    Common(Vec<u8>),
}

impl Handle {
    /// Derives the handle of a row from its primary key values.
    pub fn from_primary_key(table: &TableInfo, values: &[Value]) -> Result<Self> {
        if table.pk_is_handle() {
            return match values {
                [v] => v.as_i64().map(Handle::Int).ok_or_else(|| {
                    Error::Encoding(format!(
                        "{} is not a valid handle of `{}`",
                        v.type_name(),
                        table.name
                    ))
                }),
                _ => Err(Error::Encoding(format!(
                    "expected 1 handle value for `{}`, got {}",
                    table.name,
                    values.len()
                ))),
            };
        }
        let mut buf = Vec::new();
        encode_key_into(&mut buf, values)?;
        Ok(Handle::Common(buf))
    }

    fn append_to(&self, buf: &mut Vec<u8>) {
        match self {
            Handle::Int(id) => encode_int(buf, *id),
            Handle::Common(bytes) => buf.extend_from_slice(bytes),
        }
    }

    /// Handle bytes as stored in a unique index entry's value.
    pub fn to_value(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9);
        self.append_to(&mut buf);
        buf
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Int(id) => write!(f, "{}", id),
            Handle::Common(bytes) => write!(f, "{}", Key::from(bytes.as_slice())),
        }
    }
}

fn table_prefix(buf: &mut Vec<u8>, table_id: TableId, sep: &[u8]) {
    buf.push(TABLE_PREFIX);
    encode_int(buf, table_id);
    buf.extend_from_slice(sep);
}

/// Prefix shared by every record key of a table.
pub fn record_prefix(table_id: TableId) -> Key {
    let mut buf = Vec::with_capacity(TABLE_SEP_LEN);
    table_prefix(&mut buf, table_id, RECORD_SEP);
    Key::new(buf)
}

/// Recovers the handle from a record key.
pub fn decode_record_key(key: &[u8], common_handle: bool) -> Result<(TableId, Handle)> {
    if key.len() < TABLE_SEP_LEN || key[0] != TABLE_PREFIX || &key[9..TABLE_SEP_LEN] != RECORD_SEP
    {
        return Err(Error::Encoding(format!("invalid record key {}", Key::from(key))));
    }
    let (table_id, _) = decode_int(&key[1..9])?;
    let rest = &key[TABLE_SEP_LEN..];
    let handle = if common_handle {
        Handle::Common(rest.to_vec())
    } else {
        Handle::Int(decode_int(rest)?.0)
    };
    Ok((table_id, handle))
}

/// Builds storage keys for one table.
pub trait KeyBuilder {
    fn record_key(&self, handle: &Handle) -> Key;

    /// Encodes `values` under `index`, returning the key and whether it is
    /// distinct: the index is unique, the values cover all of its columns and
    /// none is NULL. Distinct keys identify a single entry; any other key is a
    /// prefix of the entries it matches.
    fn index_key(&self, index: &IndexInfo, values: &[Value]) -> Result<(Key, bool)>;
}

/// [`KeyBuilder`] for tables laid out as described in the module docs.
#[derive(Clone, Copy, Debug)]
pub struct TableKeyBuilder {
    table_id: TableId,
}

impl TableKeyBuilder {
    pub fn new(table_id: TableId) -> Self {
        Self { table_id }
    }

    /// Key and value of the index entry for a row stored under `handle`.
    pub fn index_entry(
        &self,
        index: &IndexInfo,
        values: &[Value],
        handle: &Handle,
    ) -> Result<(Key, Vec<u8>)> {
        let (key, distinct) = self.index_key(index, values)?;
        if distinct {
            return Ok((key, handle.to_value()));
        }
        let mut buf = key.into_inner();
        if let Handle::Int(_) = handle {
            buf.push(INT_FLAG);
        }
        handle.append_to(&mut buf);
        Ok((Key::new(buf), INDEX_PLACEHOLDER.to_vec()))
    }
}

impl KeyBuilder for TableKeyBuilder {
    fn record_key(&self, handle: &Handle) -> Key {
        let mut buf = Vec::with_capacity(TABLE_SEP_LEN + 9);
        table_prefix(&mut buf, self.table_id, RECORD_SEP);
        handle.append_to(&mut buf);
        Key::new(buf)
    }

    fn index_key(&self, index: &IndexInfo, values: &[Value]) -> Result<(Key, bool)> {
        let mut buf = Vec::with_capacity(TABLE_SEP_LEN + 8 + values.len() * 9);
        table_prefix(&mut buf, self.table_id, INDEX_SEP);
        encode_int(&mut buf, index.id);
        encode_key_into(&mut buf, values)?;
        let distinct = index.unique
            && values.len() == index.columns.len()
            && !values.iter().any(Value::is_null);
        Ok((Key::new(buf), distinct))
    }
}

/// Recovers the row handle of an index entry.
///
/// `column_count` is the number of indexed columns. Entries whose key carries
/// the handle after the values are decoded from the key, others from the value.
pub fn decode_index_handle(
    key: &[u8],
    value: &[u8],
    column_count: usize,
    common_handle: bool,
) -> Result<Handle> {
    if key.len() < TABLE_SEP_LEN + 8 || &key[9..TABLE_SEP_LEN] != INDEX_SEP {
        return Err(Error::Encoding(format!("invalid index key {}", Key::from(key))));
    }
    let mut rest = &key[TABLE_SEP_LEN + 8..];
    for _ in 0..column_count {
        rest = cut_one(rest)?.1;
    }
    if rest.is_empty() {
        return if common_handle {
            Ok(Handle::Common(value.to_vec()))
        } else {
            Ok(Handle::Int(decode_int(value)?.0))
        };
    }
    if common_handle {
        return Ok(Handle::Common(rest.to_vec()));
    }
    match rest.split_first() {
        Some((&INT_FLAG, body)) => Ok(Handle::Int(decode_int(body)?.0)),
        _ => Err(Error::Encoding(format!(
            "invalid handle in index key {}",
            Key::from(key)
        ))),
    }
}

/// A key probed by a foreign key check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckKey {
    pub key: Key,
    /// The key addresses a range of index entries rather than one entry.
    pub is_prefix: bool,
}

/// Builds the key a check probes for `values` on `table`.
///
/// Primary key matches always address a single record. Index matches are
/// point keys only when the index is `exclusive` to the constraint columns
/// (unique and fully covered) and the key is distinct.
pub fn build_check_key(
    builder: &dyn KeyBuilder,
    table: &TableInfo,
    match_key: &MatchKey,
    exclusive: bool,
    values: &[Value],
) -> Result<CheckKey> {
    match match_key {
        MatchKey::PrimaryKey => {
            let handle = Handle::from_primary_key(table, values)?;
            Ok(CheckKey {
                key: builder.record_key(&handle),
                is_prefix: false,
            })
        }
        MatchKey::Index(index) => {
            let (key, distinct) = builder.index_key(index, values)?;
            Ok(CheckKey {
                key,
                is_prefix: !(exclusive && distinct),
            })
        }
    }
}
