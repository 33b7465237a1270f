//! Table declarations: every persisted entity exposes its table name, ordered columns and owning store.

use crate::error::{AppError, RespCode};
use serde_json::Value;

/// Which physical backend owns a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Transactional row store: prepared parameters, sessions, rollback.
    Row,
    /// Append-only analytical store: literal SQL, no per-call transaction.
    Analytical,
}

/// Column value type, used for literal compilation and filter coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int,
    Float,
    Bool,
    DateTime,
    Json,
}

#[derive(Clone, Debug)]
pub struct ColumnDecl {
    pub name: &'static str,
    pub type_: ColumnType,
    pub nullable: bool,
}

impl ColumnDecl {
    pub const fn new(name: &'static str, type_: ColumnType) -> Self {
        ColumnDecl {
            name,
            type_,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, type_: ColumnType) -> Self {
        ColumnDecl {
            name,
            type_,
            nullable: true,
        }
    }
}

/// A dependent table whose rows are owned by this one and deleted with it.
#[derive(Clone, Debug)]
pub struct Dependent {
    pub table: &'static str,
    pub foreign_key: &'static str,
}

#[derive(Clone, Debug)]
pub struct TableDecl {
    pub name: &'static str,
    pub store: StoreKind,
    pub columns: Vec<ColumnDecl>,
    pub dependents: Vec<Dependent>,
    /// Columns carrying a uniqueness constraint in the row store.
    pub unique: Vec<&'static str>,
}

/// Name of the generated identifier column every table carries.
pub const ID_COLUMN: &str = "id";

impl TableDecl {
    pub fn new(name: &'static str, store: StoreKind, columns: Vec<ColumnDecl>) -> Self {
        TableDecl {
            name,
            store,
            columns,
            dependents: Vec::new(),
            unique: Vec::new(),
        }
    }

    pub fn with_unique(mut self, column: &'static str) -> Self {
        self.unique.push(column);
        self
    }

    pub fn with_dependent(mut self, table: &'static str, foreign_key: &'static str) -> Self {
        self.dependents.push(Dependent { table, foreign_key });
        self
    }

    /// Declared column names in declaration order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDecl> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Declared columns as a JSON list, used as diagnostic data on range errors.
    pub fn columns_json(&self) -> Value {
        Value::Array(
            self.columns
                .iter()
                .map(|c| Value::String(c.name.to_string()))
                .collect(),
        )
    }

    /// Resolve column names to declared column references. Any undeclared name is a range error
    /// carrying the full declared set.
    pub fn resolve_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&ColumnDecl>, AppError> {
        names
            .iter()
            .map(|n| {
                self.column(n.as_ref())
                    .ok_or_else(|| AppError::with_data(RespCode::ParamsRangeError, self.columns_json()))
            })
            .collect()
    }

    /// Resolve a single column name.
    pub fn resolve_column(&self, name: &str) -> Result<&ColumnDecl, AppError> {
        self.column(name)
            .ok_or_else(|| AppError::with_data(RespCode::ParamsRangeError, self.columns_json()))
    }
}
