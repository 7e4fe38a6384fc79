//! Table and constraint metadata
//!
//! A statement that touches a table with foreign keys carries one [`FkCheck`]
//! per constraint it must verify and one [`FkCascade`] per constraint whose
//! action it must propagate. Both are fixed when the statement's plan is
//! built; the engines in [`crate::check`] and [`crate::cascade`] execute them.
//!
//! Identifiers compare case-insensitively.

use crate::error::{Error, Result};
use proven_value::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type TableId = i64;
pub type IndexId = i64;

/// A table column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name. Can't be empty.
    pub name: String,
    /// Position of the column's value within a row.
    pub offset: usize,
    /// Column datatype.
    pub datatype: DataType,
    /// Whether the column allows null values.
    pub nullable: bool,
}

impl ColumnInfo {
    /// Creates a new nullable column. The offset is assigned by [`TableInfo::new`].
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            name: name.into(),
            offset: 0,
            datatype,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A secondary index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub id: IndexId,
    pub name: String,
    /// Indexed columns, in key order.
    pub columns: Vec<String>,
    /// Whether indexed values are unique (ignoring NULLs).
    pub unique: bool,
}

impl IndexInfo {
    pub fn new(id: IndexId, name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            id,
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Whether the index's leading columns are exactly `cols`, in order.
    pub fn has_prefix(&self, cols: &[String]) -> bool {
        self.columns.len() >= cols.len() && same_columns(&self.columns[..cols.len()], cols)
    }
}

/// Action taken on child rows when the referenced parent row changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferOption {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

/// A foreign key, as declared on the child table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FkInfo {
    pub name: String,
    /// Child columns.
    pub columns: Vec<String>,
    pub ref_schema: String,
    pub ref_table: String,
    /// Referenced parent columns, positionally matching `columns`.
    pub ref_columns: Vec<String>,
    pub on_delete: ReferOption,
    pub on_update: ReferOption,
}

impl FkInfo {
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        ref_schema: impl Into<String>,
        ref_table: impl Into<String>,
        ref_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ref_schema: ref_schema.into(),
            ref_table: ref_table.into(),
            ref_columns: ref_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: ReferOption::NoAction,
            on_update: ReferOption::NoAction,
        }
    }

    pub fn on_delete(mut self, option: ReferOption) -> Self {
        self.on_delete = option;
        self
    }

    pub fn on_update(mut self, option: ReferOption) -> Self {
        self.on_update = option;
        self
    }

    /// The parent-side view of this foreign key.
    pub fn referred(&self, child: &TableInfo) -> ReferredFkInfo {
        ReferredFkInfo {
            columns: self.ref_columns.clone(),
            child_schema: child.schema.clone(),
            child_table: child.name.clone(),
            child_fk_name: self.name.clone(),
        }
    }
}

/// A foreign key, as seen from the parent table it references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferredFkInfo {
    /// Referenced parent columns.
    pub columns: Vec<String>,
    pub child_schema: String,
    pub child_table: String,
    pub child_fk_name: String,
}

/// A table schema with the keys foreign key checks can probe.
///
/// A table's row handle is the primary key value itself when the primary key
/// is a single integer column, the encoded primary key values (a "common"
/// handle) for any other primary key, and an internal row id otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub id: TableId,
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Primary key columns, in key order. Empty if none.
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexInfo>,
    pub foreign_keys: Vec<FkInfo>,
}

impl TableInfo {
    /// Creates a table, assigning column offsets in declaration order.
    pub fn new(
        id: TableId,
        schema: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<ColumnInfo>,
    ) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(offset, column)| ColumnInfo { offset, ..column })
            .collect();
        Self {
            id,
            schema: schema.into(),
            name: name.into(),
            columns,
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_index(mut self, index: IndexInfo) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_foreign_key(mut self, fk: FkInfo) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Returns the column with the given name, if it exists.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether the single integer primary key column is the row handle.
    pub fn pk_is_handle(&self) -> bool {
        match self.primary_key.as_slice() {
            [col] => self.column(col).is_some_and(|c| c.datatype.is_integer()),
            _ => false,
        }
    }

    /// Whether rows are addressed by their encoded primary key values.
    pub fn is_common_handle(&self) -> bool {
        !self.primary_key.is_empty() && !self.pk_is_handle()
    }

    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// Finds the key that can resolve a lookup on `cols`.
    ///
    /// The primary key wins when it is exactly `cols`. Otherwise the first
    /// index led by `cols` is used, preferring one that is unique on exactly
    /// those columns.
    pub fn match_key(&self, cols: &[String]) -> Result<(MatchKey, bool)> {
        if !self.primary_key.is_empty() && same_columns(&self.primary_key, cols) {
            return Ok((MatchKey::PrimaryKey, true));
        }
        let exclusive = |idx: &IndexInfo| idx.unique && idx.columns.len() == cols.len();
        let candidates = self.indexes.iter().filter(|idx| idx.has_prefix(cols));
        let chosen = candidates
            .clone()
            .find(|idx| exclusive(idx))
            .or_else(|| candidates.clone().next());
        match chosen {
            Some(idx) => Ok((MatchKey::Index(idx.clone()), exclusive(idx))),
            None => Err(Error::IndexNotFound {
                table: self.name.clone(),
                columns: quote_columns(cols),
            }),
        }
    }
}

/// The key of the probed table a foreign key lookup resolves against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchKey {
    PrimaryKey,
    Index(IndexInfo),
}

/// Which side of the constraint a check enforces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FkDirection {
    /// Inserted or updated child rows must reference an existing parent row.
    Child,
    /// Deleted or updated parent rows must not be referenced by any child row.
    Parent(ReferredFkInfo),
}

/// A foreign key existence check planned for one statement.
#[derive(Clone, Debug, PartialEq)]
pub struct FkCheck {
    pub direction: FkDirection,
    pub fk: FkInfo,
    pub child_schema: String,
    pub child_table: String,
    /// The table whose keys are probed: the parent for child-side checks, the
    /// child for parent-side checks.
    pub probe_table: Arc<TableInfo>,
    pub match_key: MatchKey,
    /// Whether the matched key is unique on exactly the constraint columns.
    pub exclusive: bool,
}

impl FkCheck {
    /// Check run for rows inserted into or updated in `child`.
    pub fn for_child(child: &TableInfo, fk: &FkInfo, parent: Arc<TableInfo>) -> Result<Self> {
        let (match_key, exclusive) = parent.match_key(&fk.ref_columns)?;
        Ok(Self {
            direction: FkDirection::Child,
            fk: fk.clone(),
            child_schema: child.schema.clone(),
            child_table: child.name.clone(),
            probe_table: parent,
            match_key,
            exclusive,
        })
    }

    /// Check run for rows deleted from or updated in the parent table `fk`
    /// references.
    pub fn for_parent(child: Arc<TableInfo>, fk: &FkInfo) -> Result<Self> {
        let (match_key, exclusive) = child.match_key(&fk.columns)?;
        Ok(Self {
            direction: FkDirection::Parent(fk.referred(&child)),
            fk: fk.clone(),
            child_schema: child.schema.clone(),
            child_table: child.name.clone(),
            probe_table: child,
            match_key,
            exclusive,
        })
    }

    /// Whether the probed key must exist (child side) or must not (parent side).
    pub fn check_exist(&self) -> bool {
        matches!(self.direction, FkDirection::Child)
    }

    /// Columns of the processed row that carry the constraint values.
    pub fn row_columns(&self) -> &[String] {
        match &self.direction {
            FkDirection::Child => &self.fk.columns,
            FkDirection::Parent(referred) => &referred.columns,
        }
    }

    /// The error reported when this check fails.
    pub fn violation(&self) -> Error {
        let action = match self.direction {
            FkDirection::Child => "Cannot add or update a child row",
            FkDirection::Parent(_) => "Cannot delete or update a parent row",
        };
        Error::ForeignKeyViolation {
            constraint: self.fk.name.clone(),
            detail: format!(
                "{}: a foreign key constraint fails (`{}`.`{}`, CONSTRAINT `{}` FOREIGN KEY ({}) REFERENCES `{}` ({}))",
                action,
                self.child_schema.to_lowercase(),
                self.child_table.to_lowercase(),
                self.fk.name.to_lowercase(),
                quote_columns(&self.fk.columns),
                self.fk.ref_table.to_lowercase(),
                quote_columns(&self.fk.ref_columns),
            ),
        }
    }
}

/// Follow-on action a parent-side change triggers on child rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FkCascadeKind {
    OnDelete,
    OnUpdate,
}

impl fmt::Display for FkCascadeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FkCascadeKind::OnDelete => write!(f, "ON DELETE"),
            FkCascadeKind::OnUpdate => write!(f, "ON UPDATE"),
        }
    }
}

/// A cascade planned for one statement on the parent table.
#[derive(Clone, Debug, PartialEq)]
pub struct FkCascade {
    pub kind: FkCascadeKind,
    pub referred: ReferredFkInfo,
    pub child_table: Arc<TableInfo>,
    pub fk: FkInfo,
}

impl FkCascade {
    pub fn new(kind: FkCascadeKind, child_table: Arc<TableInfo>, fk: &FkInfo) -> Self {
        Self {
            kind,
            referred: fk.referred(&child_table),
            child_table,
            fk: fk.clone(),
        }
    }
}

fn same_columns(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Renders `` `a`, `b` `` with lower-cased identifiers.
pub(crate) fn quote_columns(cols: &[String]) -> String {
    cols.iter()
        .map(|c| format!("`{}`", c.to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ")
}
