//! Foreign key enforcement for transactional DML
//!
//! This crate verifies foreign key constraints and runs ON DELETE CASCADE
//! inside the transaction of the statement that modifies the rows:
//! - Child rows must reference an existing parent row
//! - Parent rows must not be deleted or updated while referenced
//! - Cascading deletes compile into a nested statement on the child table
//!
//! Storage, locking and SQL compilation stay with the host; the engines only
//! consume them through the traits in [`kv`] and [`cascade`].

pub mod cascade;
pub mod check;
pub mod config;
pub mod error;
pub mod kv;
pub mod meta;
pub mod session;
pub mod tablecodec;
pub mod trigger;
pub mod values;

pub use cascade::{FkCascadeExec, StatementCompiler, gen_cascade_delete_sql};
pub use check::{CheckContext, CheckRow, FkCheckExec};
pub use config::ForeignKeyConfig;
pub use error::{Error, Result};
pub use kv::{Key, LockCtx, LockRequester, MemBuffer, Snapshot, Transaction};
pub use meta::{FkCascade, FkCascadeKind, FkCheck, FkDirection, FkInfo, TableInfo};
pub use session::{Interrupt, StatementContext, TxnContext};
pub use trigger::{ForeignKeyTrigger, build_table_fk_checks, build_table_fk_cascades};
