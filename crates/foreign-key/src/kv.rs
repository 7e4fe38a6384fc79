//! Transactional key-value contracts consumed by the foreign key engines
//!
//! The engines never own storage. They read through the statement's
//! transaction (its write buffer layered over a committed snapshot) and ask
//! the lock layer for pessimistic locks on rows they confirmed.

use crate::error::Result;
use crate::session::TxnContext;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::time::Duration;

/// An encoded storage key
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(Vec<u8>);

impl Key {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn has_prefix(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// The smallest key greater than every key that has `self` as a prefix.
    ///
    /// Trailing `0xFF` bytes are dropped before incrementing; an all-`0xFF` (or
    /// empty) key has no such bound and yields the empty key, which range
    /// iterators treat as unbounded.
    pub fn prefix_next(&self) -> Key {
        let mut next = self.0.clone();
        while let Some(last) = next.last_mut() {
            if *last == u8::MAX {
                next.pop();
            } else {
                *last += 1;
                return Key(next);
            }
        }
        Key(next)
    }
}

impl Deref for Key {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for Key {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{}", std::ascii::escape_default(*b))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(\"{}\")", self)
    }
}

/// Ordered key-value iterator over a key range
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Key, Vec<u8>)>> + 'a>;

/// A transaction's merged view: uncommitted writes layered over a snapshot
pub trait Transaction {
    /// Point read through the write buffer, then the snapshot. Deleted and
    /// missing keys both read as `None`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Fetch many keys in one round trip. Results are best-effort and mainly
    /// serve to warm the transaction's read cache for subsequent [`get`]s.
    ///
    /// [`get`]: Transaction::get
    fn batch_get(&self, keys: &[Key]) -> Result<HashMap<Key, Vec<u8>>>;

    /// The transaction's own uncommitted writes
    fn mem_buffer(&self) -> &dyn MemBuffer;

    /// Committed data as of the transaction's read point
    fn snapshot(&self) -> &dyn Snapshot;
}

/// Uncommitted writes of a single transaction
pub trait MemBuffer {
    /// Iterate `[lower, upper)` in key order. An empty value is a tombstone
    /// left by a delete. An empty `upper` means unbounded.
    fn iter(&self, lower: &[u8], upper: &[u8]) -> Result<KvIter<'_>>;
}

/// Committed data visible at the transaction's read point
pub trait Snapshot {
    /// Iterate live committed entries in `[lower, upper)` in key order.
    /// An empty `upper` means unbounded.
    fn iter(&self, lower: &[u8], upper: &[u8]) -> Result<KvIter<'_>>;

    /// Number of entries fetched per round trip while scanning
    fn scan_batch_size(&self) -> usize;

    fn set_scan_batch_size(&self, size: usize);
}

/// Parameters for one pessimistic lock request
#[derive(Debug, Clone, PartialEq)]
pub struct LockCtx {
    /// How long to wait on a conflicting lock before giving up
    pub wait_timeout: Duration,
}

/// Pessimistic lock acquisition
pub trait LockRequester {
    /// Acquire exclusive locks on `keys` for the rest of the transaction.
    ///
    /// Fails with [`Error::LockWaitTimeout`] or [`Error::Deadlock`]. Lock
    /// layers may flag the transaction as locked-for-update in `txn_ctx`.
    ///
    /// [`Error::LockWaitTimeout`]: crate::Error::LockWaitTimeout
    /// [`Error::Deadlock`]: crate::Error::Deadlock
    fn lock_keys(&self, lock_ctx: &LockCtx, txn_ctx: &mut TxnContext, keys: &[Key]) -> Result<()>;
}

/// Overrides a snapshot's scan batch size until dropped, then restores the
/// previous value whichever way the scope is left.
pub struct ScanBatchSizeGuard<'a> {
    snapshot: &'a dyn Snapshot,
    prior: usize,
}

impl<'a> ScanBatchSizeGuard<'a> {
    pub fn set(snapshot: &'a dyn Snapshot, size: usize) -> Self {
        let prior = snapshot.scan_batch_size();
        snapshot.set_scan_batch_size(size);
        Self { snapshot, prior }
    }
}

impl Drop for ScanBatchSizeGuard<'_> {
    fn drop(&mut self) {
        self.snapshot.set_scan_batch_size(self.prior);
    }
}
