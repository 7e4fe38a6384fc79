//! ON DELETE CASCADE
//!
//! Deleting parent rows under a cascading constraint deletes the child rows
//! that reference them. [`FkCascadeExec`] collects the referenced values of
//! the deleted parent rows and turns them into a single DELETE statement on
//! the child table, compiled by the host's [`StatementCompiler`] so that it
//! runs in the same transaction (and fires the child table's own foreign key
//! checks and cascades in turn).

use crate::error::{Error, Result};
use crate::meta::{FkCascade, FkCascadeKind, TableInfo, quote_columns};
use crate::values::FkValueHelper;
use proven_value::Value;

/// Compiles generated statements into plans the host can execute.
///
/// Implementations carry the session and transaction of the statement that
/// triggered the cascade.
pub trait StatementCompiler {
    type Statement;
    type Plan;

    fn parse(&self, sql: &str) -> Result<Self::Statement>;

    fn compile(&self, stmt: Self::Statement) -> Result<Self::Plan>;
}

/// Executes one [`FkCascade`] for the rows deleted by one statement.
pub struct FkCascadeExec {
    cascade: FkCascade,
    helper: FkValueHelper,
    fk_values: Vec<Vec<Value>>,
}

impl FkCascadeExec {
    /// Builds the executor for rows of `table`, the parent table.
    pub fn new(table: &TableInfo, cascade: FkCascade) -> Result<Self> {
        let helper = FkValueHelper::for_columns(table, &cascade.referred.columns)?;
        Ok(Self {
            cascade,
            helper,
            fk_values: Vec::new(),
        })
    }

    pub fn cascade(&self) -> &FkCascade {
        &self.cascade
    }

    /// Referenced values buffered so far.
    pub fn fk_values(&self) -> &[Vec<Value>] {
        &self.fk_values
    }

    pub fn on_delete(&mut self, row: &[Value]) -> Result<()> {
        if let Some(values) = self.helper.fetch_values_deduped(row)? {
            self.fk_values.push(values);
        }
        Ok(())
    }

    /// Renders the statement for the buffered values, draining them. Returns
    /// `None` when no row needs cascading.
    pub fn build_sql(&mut self) -> Result<Option<String>> {
        if self.fk_values.is_empty() {
            return Ok(None);
        }
        let fk_values = std::mem::take(&mut self.fk_values);
        let sql = match self.cascade.kind {
            FkCascadeKind::OnDelete => gen_cascade_delete_sql(
                &self.cascade.referred.child_schema,
                &self.cascade.child_table.name,
                &self.cascade.fk.columns,
                &fk_values,
            )?,
            kind => return Err(Error::UnsupportedCascade(kind.to_string())),
        };
        tracing::debug!(
            "Foreign key `{}` cascades {} values: {}",
            self.cascade.fk.name,
            fk_values.len(),
            sql
        );
        Ok(Some(sql))
    }

    /// Compiles the cascade statement for the buffered values. Returns `None`
    /// when no row needs cascading.
    pub fn build_executor<C: StatementCompiler>(
        &mut self,
        compiler: &C,
    ) -> Result<Option<C::Plan>> {
        let Some(sql) = self.build_sql()? else {
            return Ok(None);
        };
        let stmt = compiler.parse(&sql)?;
        compiler.compile(stmt).map(Some)
    }
}

/// Renders `` DELETE FROM `schema`.`table` WHERE (`a`, `b`) IN ((1,2), (3,4)) ``.
///
/// A single column renders its values without tuple parentheses:
/// `` WHERE (`name`) IN ('x', 'y') ``.
pub fn gen_cascade_delete_sql(
    schema: &str,
    table: &str,
    cols: &[String],
    fk_values: &[Vec<Value>],
) -> Result<String> {
    if cols.is_empty() || fk_values.is_empty() {
        return Err(Error::CascadeGeneration(format!(
            "nothing to delete from `{}`.`{}`",
            schema, table
        )));
    }
    let mut items = Vec::with_capacity(fk_values.len());
    for values in fk_values {
        if values.len() != cols.len() {
            return Err(Error::CascadeGeneration(format!(
                "expected {} values, got {}",
                cols.len(),
                values.len()
            )));
        }
        let literals = values
            .iter()
            .map(value_literal)
            .collect::<Result<Vec<_>>>()?;
        if cols.len() == 1 {
            items.extend(literals);
        } else {
            items.push(format!("({})", literals.join(",")));
        }
    }
    Ok(format!(
        "DELETE FROM `{}`.`{}` WHERE ({}) IN ({})",
        schema.to_lowercase(),
        table.to_lowercase(),
        quote_columns(cols),
        items.join(", ")
    ))
}

/// Numbers render bare, bytes as a hex literal, everything else as a quoted
/// string literal.
fn value_literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Err(Error::CascadeGeneration(
            "NULL can't be matched by a cascade".into(),
        )),
        Value::F32(f) if !f.is_finite() => Err(non_finite(value)),
        Value::F64(f) if !f.is_finite() => Err(non_finite(value)),
        Value::Bytea(b) => Ok(format!("x'{}'", hex::encode(b))),
        v if v.is_numeric() => Ok(v.to_string()),
        v => Ok(quote_string(&v.to_string())),
    }
}

fn non_finite(value: &Value) -> Error {
    Error::CascadeGeneration(format!("{} has no SQL literal", value))
}

fn quote_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        match c {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}
