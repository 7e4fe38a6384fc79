//! Session and statement state the engines read or update
//!
//! These are passed in explicitly by the DML executor rather than looked up
//! from a global session, so every engine can be driven from tests with
//! plain values.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Transaction-scoped flags shared by all statements of a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxnContext {
    /// Set once the transaction has taken pessimistic locks for update. While
    /// unset, a write conflict can still be resolved by retrying the whole
    /// statement.
    pub for_update: bool,
}

/// Cooperative cancellation flag for a running statement
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation (e.g. `KILL QUERY`)
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns [`Error::Interrupted`] once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}

/// Per-statement diagnostics and cancellation
#[derive(Debug, Default)]
pub struct StatementContext {
    warnings: Vec<Error>,
    interrupt: Interrupt,
}

impl StatementContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interrupt(interrupt: Interrupt) -> Self {
        Self {
            warnings: Vec::new(),
            interrupt,
        }
    }

    pub fn append_warning(&mut self, warning: Error) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }
}
