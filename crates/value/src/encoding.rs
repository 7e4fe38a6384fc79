//! Memcomparable key encoding for Value
//!
//! Every encoded value starts with a type flag and is self-delimiting, so a
//! tuple of values can be concatenated into a key and cut apart again without
//! a length header. Two consequences matter to callers building keys:
//!
//! - equal tuples always produce identical bytes (decimals are normalized,
//!   `-0.0` folds into `0.0`, `F32` widens to the `F64` encoding);
//! - the encoding of a tuple is a byte prefix of the encoding of a longer tuple
//!   only if the shorter tuple is a prefix of the longer one.
//!
//! Strings and bytes use group encoding: 8-byte groups each followed by a
//! marker byte (`0xFF` for a full group, `0xFF - pad` for the last one).

use crate::types::Value;
use chrono::Datelike;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Insufficient bytes to decode {0}")]
    Insufficient(&'static str),
}

pub const NIL_FLAG: u8 = 0x00;
pub const BYTES_FLAG: u8 = 0x01;
pub const STRING_FLAG: u8 = 0x02;
pub const INT_FLAG: u8 = 0x03;
pub const UINT_FLAG: u8 = 0x04;
pub const FLOAT_FLAG: u8 = 0x05;
pub const DECIMAL_FLAG: u8 = 0x06;
pub const DATE_FLAG: u8 = 0x07;
pub const TIMESTAMP_FLAG: u8 = 0x08;

const SIGN_MASK: u64 = 0x8000_0000_0000_0000;
const ENC_GROUP_SIZE: usize = 8;
const ENC_MARKER: u8 = 0xFF;
const ENC_PAD: u8 = 0x00;
const DECIMAL_BODY_LEN: usize = 16 + 4;

// ============================================================================
// Encoding
// ============================================================================

/// Encode a tuple of values into a comparable key
pub fn encode_key(values: &[Value]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(values.len() * 9);
    encode_key_into(&mut buf, values)?;
    Ok(buf)
}

/// Append the comparable encoding of `values` to `buf`
pub fn encode_key_into(buf: &mut Vec<u8>, values: &[Value]) -> Result<()> {
    for value in values {
        encode_one(buf, value)?;
    }
    Ok(())
}

fn encode_one(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.push(NIL_FLAG),
        Value::I64(i) => {
            buf.push(INT_FLAG);
            encode_int(buf, *i);
        }
        Value::U64(u) => {
            buf.push(UINT_FLAG);
            buf.extend_from_slice(&u.to_be_bytes());
        }
        Value::F32(f) => encode_float(buf, *f as f64)?,
        Value::F64(f) => encode_float(buf, *f)?,
        Value::Decimal(d) => {
            buf.push(DECIMAL_FLAG);
            let d = d.normalize();
            let sortable = (d.mantissa() as u128) ^ (1u128 << 127);
            buf.extend_from_slice(&sortable.to_be_bytes());
            buf.extend_from_slice(&d.scale().to_be_bytes());
        }
        Value::Str(s) => {
            buf.push(STRING_FLAG);
            encode_bytes(buf, s.as_bytes());
        }
        Value::Bytea(b) => {
            buf.push(BYTES_FLAG);
            encode_bytes(buf, b);
        }
        Value::Date(d) => {
            buf.push(DATE_FLAG);
            encode_int(buf, d.num_days_from_ce() as i64);
        }
        Value::Timestamp(ts) => {
            buf.push(TIMESTAMP_FLAG);
            encode_int(buf, ts.and_utc().timestamp_micros());
        }
    }
    Ok(())
}

fn encode_float(buf: &mut Vec<u8>, f: f64) -> Result<()> {
    if f.is_nan() {
        return Err(Error::Encoding("cannot encode NaN into a key".into()));
    }
    // -0.0 and 0.0 compare equal and must share one key
    let f = if f == 0.0 { 0.0 } else { f };
    let bits = f.to_bits();
    let sortable = if f.is_sign_negative() {
        !bits
    } else {
        bits ^ SIGN_MASK
    };
    buf.push(FLOAT_FLAG);
    buf.extend_from_slice(&sortable.to_be_bytes());
    Ok(())
}

/// Append a sign-flipped big-endian i64 (no flag byte)
pub fn encode_int(buf: &mut Vec<u8>, i: i64) {
    buf.extend_from_slice(&((i as u64) ^ SIGN_MASK).to_be_bytes());
}

/// Append group-encoded bytes (no flag byte)
pub fn encode_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    let groups = data.len() / ENC_GROUP_SIZE + 1;
    buf.reserve(groups * (ENC_GROUP_SIZE + 1));
    let mut idx = 0;
    while idx <= data.len() {
        let remain = data.len() - idx;
        if remain >= ENC_GROUP_SIZE {
            buf.extend_from_slice(&data[idx..idx + ENC_GROUP_SIZE]);
            buf.push(ENC_MARKER);
        } else {
            let pad = ENC_GROUP_SIZE - remain;
            buf.extend_from_slice(&data[idx..]);
            buf.extend(std::iter::repeat_n(ENC_PAD, pad));
            buf.push(ENC_MARKER - pad as u8);
        }
        idx += ENC_GROUP_SIZE;
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a sign-flipped big-endian i64, returning the remaining bytes
pub fn decode_int(b: &[u8]) -> Result<(i64, &[u8])> {
    if b.len() < 8 {
        return Err(Error::Insufficient("int"));
    }
    let (head, rest) = b.split_at(8);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(head);
    Ok(((u64::from_be_bytes(raw) ^ SIGN_MASK) as i64, rest))
}

fn group_encoded_len(b: &[u8]) -> Result<usize> {
    let mut offset = 0;
    loop {
        if b.len() < offset + ENC_GROUP_SIZE + 1 {
            return Err(Error::Insufficient("bytes"));
        }
        let marker = b[offset + ENC_GROUP_SIZE];
        offset += ENC_GROUP_SIZE + 1;
        if marker != ENC_MARKER {
            return Ok(offset);
        }
    }
}

/// Split the first encoded value off `b`, returning `(value_bytes, rest)`
pub fn cut_one(b: &[u8]) -> Result<(&[u8], &[u8])> {
    let Some(&flag) = b.first() else {
        return Err(Error::Insufficient("flag"));
    };
    let body = match flag {
        NIL_FLAG => 0,
        INT_FLAG | UINT_FLAG | FLOAT_FLAG | DATE_FLAG | TIMESTAMP_FLAG => 8,
        DECIMAL_FLAG => DECIMAL_BODY_LEN,
        BYTES_FLAG | STRING_FLAG => group_encoded_len(&b[1..])?,
        other => return Err(Error::Decoding(format!("unknown flag {:#04x}", other))),
    };
    if b.len() < 1 + body {
        return Err(Error::Insufficient("value"));
    }
    Ok(b.split_at(1 + body))
}
