//! Foreign key existence checks
//!
//! An [`FkCheckExec`] is built per constraint for every table a statement
//! modifies. Row hooks queue the keys to probe while the statement runs;
//! [`FkCheckExec::do_check`] resolves them all against the transaction when
//! the statement has processed its last row, then locks the parent rows it
//! relied on so they can't disappear before commit.

use crate::config::ForeignKeyConfig;
use crate::error::Result;
use crate::kv::{Key, KvIter, LockCtx, LockRequester, ScanBatchSizeGuard, Transaction};
use crate::meta::{FkCheck, FkDirection, MatchKey, TableInfo};
use crate::session::{Interrupt, StatementContext, TxnContext};
use crate::tablecodec::{
    CheckKey, KeyBuilder, TableKeyBuilder, build_check_key, decode_index_handle,
};
use crate::values::FkValueHelper;
use proven_value::Value;
use std::collections::HashMap;

/// Everything a check needs from the running statement
pub struct CheckContext<'a> {
    pub txn: &'a dyn Transaction,
    pub locker: &'a dyn LockRequester,
    pub config: &'a ForeignKeyConfig,
    pub txn_ctx: &'a mut TxnContext,
    pub stmt: &'a mut StatementContext,
}

/// A row submitted to the tolerant batch path
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRow {
    pub row: Vec<Value>,
    /// Set for rows the caller must skip. Rows that fail a check are flagged
    /// here instead of failing the batch.
    pub ignored: bool,
}

impl CheckRow {
    pub fn new(row: Vec<Value>) -> Self {
        Self {
            row,
            ignored: false,
        }
    }
}

/// Executes one [`FkCheck`] for the rows of one statement.
pub struct FkCheckExec {
    check: FkCheck,
    helper: FkValueHelper,
    key_builder: TableKeyBuilder,
    to_be_checked_keys: Vec<Key>,
    to_be_checked_prefix_keys: Vec<Key>,
    to_be_locked_keys: Vec<Key>,
    /// Verdicts of the tolerant path by key; `true` means the check failed.
    check_rows_cache: HashMap<Key, bool>,
}

impl FkCheckExec {
    /// Builds the executor for rows of `table`, the table the statement modifies.
    pub fn new(table: &TableInfo, check: FkCheck) -> Result<Self> {
        let helper = FkValueHelper::for_columns(table, check.row_columns())?;
        let key_builder = TableKeyBuilder::new(check.probe_table.id);
        Ok(Self {
            check,
            helper,
            key_builder,
            to_be_checked_keys: Vec::new(),
            to_be_checked_prefix_keys: Vec::new(),
            to_be_locked_keys: Vec::new(),
            check_rows_cache: HashMap::new(),
        })
    }

    pub fn check(&self) -> &FkCheck {
        &self.check
    }

    /// Number of keys waiting for [`do_check`](Self::do_check).
    pub fn pending_keys(&self) -> usize {
        self.to_be_checked_keys.len() + self.to_be_checked_prefix_keys.len()
    }

    /// Keys confirmed to exist that the next [`do_check`](Self::do_check) locks.
    pub fn to_be_locked_keys(&self) -> &[Key] {
        &self.to_be_locked_keys
    }

    pub fn on_insert(&mut self, row: &[Value]) -> Result<()> {
        self.enqueue(row)
    }

    /// A child row must still reference a parent after the update, and a parent
    /// row's old values must no longer be referenced.
    pub fn on_update(&mut self, old_row: &[Value], new_row: &[Value]) -> Result<()> {
        match self.check.direction {
            FkDirection::Child => self.enqueue(new_row),
            FkDirection::Parent(_) => self.enqueue(old_row),
        }
    }

    pub fn on_delete(&mut self, row: &[Value]) -> Result<()> {
        self.enqueue(row)
    }

    /// Queues the key for `row`'s constraint values unless they contain NULL
    /// or were already queued by this statement.
    pub fn enqueue(&mut self, row: &[Value]) -> Result<()> {
        let Some(values) = self.helper.fetch_values_deduped(row)? else {
            return Ok(());
        };
        let CheckKey { key, is_prefix } = self.build_key(&values)?;
        if is_prefix {
            self.to_be_checked_prefix_keys.push(key);
        } else {
            self.to_be_checked_keys.push(key);
        }
        Ok(())
    }

    fn build_key(&self, values: &[Value]) -> Result<CheckKey> {
        build_check_key(
            &self.key_builder,
            &self.check.probe_table,
            &self.check.match_key,
            self.check.exclusive,
            values,
        )
    }

    /// Resolves every queued key, failing on the first violated check, then
    /// locks the rows the checks confirmed. Queues are drained either way.
    pub fn do_check(&mut self, ctx: &mut CheckContext<'_>) -> Result<()> {
        let keys = std::mem::take(&mut self.to_be_checked_keys);
        let prefix_keys = std::mem::take(&mut self.to_be_checked_prefix_keys);
        if !keys.is_empty() || !prefix_keys.is_empty() {
            tracing::debug!(
                "Checking foreign key `{}`: {} point keys, {} prefix keys",
                self.check.fk.name,
                keys.len(),
                prefix_keys.len()
            );
        }

        let result = self
            .check_keys(ctx, &keys)
            .and_then(|()| self.check_prefix_keys(ctx, &prefix_keys));
        let locked = std::mem::take(&mut self.to_be_locked_keys);
        result?;
        if locked.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            "Locking {} rows referenced by foreign key `{}`",
            locked.len(),
            self.check.fk.name
        );
        lock_keys(ctx, &locked)
    }

    fn check_keys(&mut self, ctx: &CheckContext<'_>, keys: &[Key]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        // Warm the transaction's read cache; verdicts come from `get` below.
        ctx.txn.batch_get(keys)?;
        for key in keys {
            let locked = self.resolve_key(ctx.txn, ctx.stmt.interrupt(), key, false)?;
            self.to_be_locked_keys.extend(locked);
        }
        Ok(())
    }

    fn check_prefix_keys(&mut self, ctx: &CheckContext<'_>, keys: &[Key]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let txn = ctx.txn;
        let _batch = ScanBatchSizeGuard::set(txn.snapshot(), ctx.config.prefix_scan_batch_size);
        for key in keys {
            let locked = self.resolve_key(txn, ctx.stmt.interrupt(), key, true)?;
            self.to_be_locked_keys.extend(locked);
        }
        Ok(())
    }

    /// Checks one key against the transaction's merged view.
    ///
    /// Returns the record key to lock when the check confirmed a row exists,
    /// `None` when it passed without confirming one, and the constraint's
    /// violation error when it failed.
    fn resolve_key(
        &self,
        txn: &dyn Transaction,
        interrupt: &Interrupt,
        key: &Key,
        is_prefix: bool,
    ) -> Result<Option<Key>> {
        let found = if is_prefix {
            seek_prefix(txn, interrupt, key)?
        } else {
            txn.get(key)?.map(|value| (key.clone(), value))
        };
        match (self.check.check_exist(), found) {
            (true, Some((found_key, _))) if !is_prefix => Ok(Some(found_key)),
            (true, Some((found_key, value))) => Ok(Some(self.record_key_of(&found_key, &value)?)),
            (false, None) => Ok(None),
            _ => Err(self.check.violation()),
        }
    }

    /// The record key of the row an index entry points to.
    fn record_key_of(&self, index_key: &Key, value: &[u8]) -> Result<Key> {
        let MatchKey::Index(index) = &self.check.match_key else {
            return Ok(index_key.clone());
        };
        let handle = decode_index_handle(
            index_key,
            value,
            index.columns.len(),
            self.check.probe_table.is_common_handle(),
        )?;
        Ok(self.key_builder.record_key(&handle))
    }

    /// Tolerant variant of [`enqueue`](Self::enqueue) plus
    /// [`do_check`](Self::do_check) for bulk loads that skip bad rows.
    ///
    /// Rows failing the check are flagged `ignored` and reported as warnings
    /// on the statement; any other error aborts. Verdicts are cached by key
    /// across calls, so a repeated key reuses its verdict, including a failure.
    /// Confirmed rows are locked by the next `do_check`.
    pub fn check_rows(&mut self, ctx: &mut CheckContext<'_>, rows: &mut [CheckRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut check_keys = Vec::with_capacity(rows.len());
        let mut prefetch = Vec::new();
        for row in rows.iter() {
            if row.ignored {
                check_keys.push(None);
                continue;
            }
            let values = self.helper.fetch_values(&row.row)?;
            if FkValueHelper::has_null(&values) {
                check_keys.push(None);
                continue;
            }
            let key = self.build_key(&values)?;
            if !key.is_prefix && !self.check_rows_cache.contains_key(&key.key) {
                prefetch.push(key.key.clone());
            }
            check_keys.push(Some(key));
        }
        let txn = ctx.txn;
        if !prefetch.is_empty() {
            txn.batch_get(&prefetch)?;
        }

        let has_prefix_keys = check_keys.iter().flatten().any(|k| k.is_prefix);
        let _batch = has_prefix_keys
            .then(|| ScanBatchSizeGuard::set(txn.snapshot(), ctx.config.prefix_scan_batch_size));
        for (row, check_key) in rows.iter_mut().zip(check_keys) {
            let Some(CheckKey { key, is_prefix }) = check_key else {
                continue;
            };
            let failed = match self.check_rows_cache.get(&key) {
                Some(&failed) => failed,
                None => {
                    match self.resolve_key(txn, ctx.stmt.interrupt(), &key, is_prefix) {
                        Ok(locked) => {
                            self.to_be_locked_keys.extend(locked);
                            self.check_rows_cache.insert(key, false);
                            false
                        }
                        Err(e) if e.is_constraint_violation() => {
                            self.check_rows_cache.insert(key, true);
                            true
                        }
                        Err(e) => return Err(e),
                    }
                }
            };
            if failed {
                let violation = self.check.violation();
                tracing::warn!("Skipping row: {}", violation);
                row.ignored = true;
                ctx.stmt.append_warning(violation);
            }
        }
        Ok(())
    }
}

/// Acquires exclusive locks on `keys`, leaving the transaction's for-update
/// marker as it found it so the statement stays retryable on write conflicts.
fn lock_keys(ctx: &mut CheckContext<'_>, keys: &[Key]) -> Result<()> {
    let lock_ctx = LockCtx {
        wait_timeout: ctx.config.lock_wait_timeout,
    };
    let for_update = ctx.txn_ctx.for_update;
    let result = ctx.locker.lock_keys(&lock_ctx, ctx.txn_ctx, keys);
    ctx.txn_ctx.for_update = for_update;
    result
}

type Entry = (Key, Vec<u8>);

/// Finds the first live entry under `prefix` in the transaction's merged view.
///
/// Walks the write buffer and the snapshot side by side in key order. Where
/// both hold a key the write buffer's entry decides, and an empty value there
/// is a delete that hides the snapshot's entry.
fn seek_prefix(
    txn: &dyn Transaction,
    interrupt: &Interrupt,
    prefix: &Key,
) -> Result<Option<Entry>> {
    let upper = prefix.prefix_next();
    let mut local_iter = txn.mem_buffer().iter(prefix, &upper)?;
    let mut snap_iter = txn.snapshot().iter(prefix, &upper)?;

    let mut local = next_in_prefix(&mut local_iter, prefix, interrupt)?;
    let mut snap = next_in_prefix(&mut snap_iter, prefix, interrupt)?;
    loop {
        match (local.take(), snap.take()) {
            (None, None) => return Ok(None),
            (None, Some(entry)) => return Ok(Some(entry)),
            (Some(local_entry), Some(snap_entry)) if snap_entry.0 < local_entry.0 => {
                return Ok(Some(snap_entry));
            }
            (Some((key, value)), snap_head) => {
                if !value.is_empty() {
                    return Ok(Some((key, value)));
                }
                snap = match snap_head {
                    Some((snap_key, _)) if snap_key == key => {
                        next_in_prefix(&mut snap_iter, prefix, interrupt)?
                    }
                    other => other,
                };
                local = next_in_prefix(&mut local_iter, prefix, interrupt)?;
            }
        }
    }
}

/// Advances `iter`, yielding `None` once it leaves `prefix`.
fn next_in_prefix(
    iter: &mut KvIter<'_>,
    prefix: &Key,
    interrupt: &Interrupt,
) -> Result<Option<Entry>> {
    interrupt.check()?;
    match iter.next().transpose()? {
        Some((key, value)) if key.has_prefix(prefix) => Ok(Some((key, value))),
        _ => Ok(None),
    }
}
