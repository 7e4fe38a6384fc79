//! Per-table foreign key executors for DML statements
//!
//! A statement builds its executors once, when its plan is built, for every
//! table it modifies. Executors hold statement-scoped state and are dropped
//! with the statement.

use crate::cascade::FkCascadeExec;
use crate::check::{CheckContext, FkCheckExec};
use crate::config::ForeignKeyConfig;
use crate::error::Result;
use crate::meta::{FkCascade, FkCheck, TableId, TableInfo};
use std::collections::HashMap;
use std::sync::Arc;

/// Implemented by DML executors that fire foreign key checks and cascades.
pub trait ForeignKeyTrigger {
    fn fk_checks(&mut self) -> &mut [FkCheckExec];

    fn fk_cascades(&mut self) -> &mut [FkCascadeExec];

    fn has_fk_cascades(&mut self) -> bool {
        !self.fk_cascades().is_empty()
    }

    /// Runs the pending checks of every constraint, in declaration order.
    fn do_fk_checks(&mut self, ctx: &mut CheckContext<'_>) -> Result<()> {
        for check in self.fk_checks() {
            check.do_check(ctx)?;
        }
        Ok(())
    }
}

/// Builds the check executors of each modified table.
///
/// Nothing is built while foreign key checks are disabled.
pub fn build_table_fk_checks(
    config: &ForeignKeyConfig,
    tables: &HashMap<TableId, Arc<TableInfo>>,
    fk_checks: HashMap<TableId, Vec<FkCheck>>,
) -> Result<HashMap<TableId, Vec<FkCheckExec>>> {
    let mut execs = HashMap::new();
    if !config.foreign_key_checks {
        return Ok(execs);
    }
    for (table_id, checks) in fk_checks {
        let Some(table) = tables.get(&table_id) else {
            continue;
        };
        let table_execs = checks
            .into_iter()
            .map(|check| FkCheckExec::new(table, check))
            .collect::<Result<Vec<_>>>()?;
        execs.insert(table_id, table_execs);
    }
    Ok(execs)
}

/// Builds the cascade executors of each modified table.
pub fn build_table_fk_cascades(
    tables: &HashMap<TableId, Arc<TableInfo>>,
    fk_cascades: HashMap<TableId, Vec<FkCascade>>,
) -> Result<HashMap<TableId, Vec<FkCascadeExec>>> {
    let mut execs = HashMap::new();
    for (table_id, cascades) in fk_cascades {
        let Some(table) = tables.get(&table_id) else {
            continue;
        };
        let table_execs = cascades
            .into_iter()
            .map(|cascade| FkCascadeExec::new(table, cascade))
            .collect::<Result<Vec<_>>>()?;
        execs.insert(table_id, table_execs);
    }
    Ok(execs)
}
