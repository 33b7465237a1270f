//! Runs one logical statement against whichever store owns its table and
//! normalizes the outcome across both.

use crate::config::{StoreKind, TableRegistry, ID_COLUMN};
use crate::error::ExecFailure;
use crate::sql::{literal, Insert, SqlValue, Statement};
use crate::store::{AnalyticalClient, Row, RowStore, WorkUnit};
use serde_json::Value;
use std::sync::Arc;

/// Shape expected from a select.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecFlags {
    /// Expect multiple rows.
    pub many: bool,
    /// Unwrap single-column rows to bare values.
    pub scalar: bool,
}

impl ExecFlags {
    pub const ROW: ExecFlags = ExecFlags { many: false, scalar: false };
    pub const ROWS: ExecFlags = ExecFlags { many: true, scalar: false };
    pub const SCALAR: ExecFlags = ExecFlags { many: false, scalar: true };
    pub const SCALARS: ExecFlags = ExecFlags { many: true, scalar: true };
}

/// Normalized statement result.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Rows(Vec<Row>),
    Row(Option<Row>),
    Values(Vec<Value>),
    Value(Option<Value>),
    /// Identifiers of inserted rows, in row order.
    Inserted(Vec<String>),
    Affected(u64),
}

impl Outcome {
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Outcome::Rows(rows) => rows,
            Outcome::Row(row) => row.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            Outcome::Row(row) => row,
            Outcome::Rows(rows) => rows.into_iter().next(),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Value(v) => v,
            Outcome::Values(vs) => vs.into_iter().next(),
            Outcome::Row(r) => r.and_then(Row::into_first),
            _ => None,
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            Outcome::Values(vs) => vs,
            Outcome::Value(v) => v.into_iter().collect(),
            Outcome::Rows(rows) => rows.into_iter().filter_map(Row::into_first).collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_ids(self) -> Vec<String> {
        match self {
            Outcome::Inserted(ids) => ids,
            _ => Vec::new(),
        }
    }

    pub fn affected(&self) -> u64 {
        match self {
            Outcome::Affected(n) => *n,
            _ => 0,
        }
    }
}

/// Generated identifier for a row-store record: 16 lowercase hex characters.
pub fn row_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[hex.len() - 16..].to_string()
}

/// Generated identifier for an analytical record.
pub fn analytical_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct Executor {
    registry: Arc<TableRegistry>,
    row_store: Arc<dyn RowStore>,
    analytical: Arc<dyn AnalyticalClient>,
}

impl Executor {
    pub fn new(
        registry: Arc<TableRegistry>,
        row_store: Arc<dyn RowStore>,
        analytical: Arc<dyn AnalyticalClient>,
    ) -> Self {
        Executor {
            registry,
            row_store,
            analytical,
        }
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn row_store(&self) -> &Arc<dyn RowStore> {
        &self.row_store
    }

    pub fn analytical(&self) -> &Arc<dyn AnalyticalClient> {
        &self.analytical
    }

    /// Acquire a work unit for one call.
    pub async fn begin(&self) -> Result<Box<dyn WorkUnit>, ExecFailure> {
        self.row_store.begin().await
    }

    pub async fn close(&self) {
        self.row_store.close().await;
    }

    /// Run one statement.
    ///
    /// A supplied work unit bypasses routing and runs the statement on the row store;
    /// otherwise the target table decides. Failures on the row path roll the unit back.
    pub async fn execute(
        &self,
        stmt: Statement,
        flags: ExecFlags,
        unit: Option<&mut dyn WorkUnit>,
    ) -> Result<Outcome, ExecFailure> {
        let stmt = assign_ids(stmt, |t| self.registry.store_of(t));
        match unit {
            Some(unit) => run_row(unit, &stmt, flags).await,
            None => match self.registry.store_of(stmt.table()) {
                StoreKind::Analytical => self.run_analytical(&stmt, flags).await,
                StoreKind::Row => {
                    let mut unit = self.row_store.begin().await?;
                    let result = run_row(unit.as_mut(), &stmt, flags).await;
                    let closed = unit.close().await;
                    match (result, closed) {
                        (Ok(out), Ok(())) => Ok(out),
                        (Err(e), _) | (Ok(_), Err(e)) => Err(e),
                    }
                }
            },
        }
    }

    async fn run_analytical(&self, stmt: &Statement, flags: ExecFlags) -> Result<Outcome, ExecFailure> {
        let Some(sql) = literal::render(stmt) else {
            return Err(ExecFailure::rejected(format!(
                "{} is append-only; update and delete are not supported",
                stmt.table()
            )));
        };
        match stmt {
            Statement::Select(_) => {
                let rows = self.analytical.query(&sql).await.map_err(|e| {
                    tracing::error!(error = %e, "analytical select failed");
                    e
                })?;
                Ok(shape(rows, flags))
            }
            Statement::Insert(insert) => {
                let body = insert.is_batch().then(|| literal::insert_rows(insert));
                self.analytical.execute(&sql, body).await.map_err(|e| {
                    tracing::error!(error = %e, "analytical insert failed");
                    e
                })?;
                Ok(Outcome::Inserted(inserted_ids(insert)))
            }
            Statement::Update(_) | Statement::Delete(_) => Ok(Outcome::Affected(0)),
        }
    }

    /// Select many rows.
    pub async fn fetch_all(&self, stmt: impl Into<Statement>, unit: Option<&mut dyn WorkUnit>) -> Result<Vec<Row>, ExecFailure> {
        Ok(self.execute(stmt.into(), ExecFlags::ROWS, unit).await?.into_rows())
    }

    /// Select at most one row.
    pub async fn fetch_one(&self, stmt: impl Into<Statement>, unit: Option<&mut dyn WorkUnit>) -> Result<Option<Row>, ExecFailure> {
        Ok(self.execute(stmt.into(), ExecFlags::ROW, unit).await?.into_row())
    }

    /// Select a single value.
    pub async fn fetch_scalar(&self, stmt: impl Into<Statement>, unit: Option<&mut dyn WorkUnit>) -> Result<Option<Value>, ExecFailure> {
        Ok(self.execute(stmt.into(), ExecFlags::SCALAR, unit).await?.into_value())
    }

    /// Insert and return generated identifiers.
    pub async fn insert(&self, insert: Insert, unit: Option<&mut dyn WorkUnit>) -> Result<Vec<String>, ExecFailure> {
        Ok(self.execute(Statement::Insert(insert), ExecFlags::default(), unit).await?.into_ids())
    }

    /// Update or delete; returns the affected row count.
    pub async fn modify(&self, stmt: impl Into<Statement>, unit: Option<&mut dyn WorkUnit>) -> Result<u64, ExecFailure> {
        Ok(self.execute(stmt.into(), ExecFlags::default(), unit).await?.affected())
    }
}

async fn run_row(unit: &mut dyn WorkUnit, stmt: &Statement, flags: ExecFlags) -> Result<Outcome, ExecFailure> {
    let result = match stmt {
        Statement::Select(_) => unit.fetch(stmt).await.map(|rows| shape(rows, flags)),
        Statement::Insert(_) => unit.fetch(stmt).await.map(|rows| {
            Outcome::Inserted(
                rows.iter()
                    .filter_map(|r| r.get(ID_COLUMN).map(id_text))
                    .collect(),
            )
        }),
        Statement::Update(_) | Statement::Delete(_) => unit.execute(stmt).await.map(Outcome::Affected),
    };
    if let Err(e) = &result {
        tracing::warn!(table = %stmt.table(), error = %e, "statement failed, rolling back");
        unit.rollback().await;
    }
    result
}

fn id_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fill in identifiers for inserts that do not carry one.
fn assign_ids(stmt: Statement, store_of: impl Fn(&str) -> StoreKind) -> Statement {
    let Statement::Insert(mut insert) = stmt else {
        return stmt;
    };
    if insert.columns.iter().any(|c| c == ID_COLUMN) {
        return Statement::Insert(insert);
    }
    let generate = match store_of(&insert.table) {
        StoreKind::Row => row_id,
        StoreKind::Analytical => analytical_id,
    };
    insert.columns.insert(0, ID_COLUMN.to_string());
    for row in &mut insert.rows {
        row.insert(0, SqlValue::Text(generate()));
    }
    Statement::Insert(insert)
}

fn inserted_ids(insert: &Insert) -> Vec<String> {
    let Some(idx) = insert.columns.iter().position(|c| c == ID_COLUMN) else {
        return Vec::new();
    };
    insert
        .rows
        .iter()
        .filter_map(|r| r.get(idx))
        .map(|v| id_text(&v.to_json()))
        .collect()
}

fn shape(rows: Vec<Row>, flags: ExecFlags) -> Outcome {
    match (flags.many, flags.scalar) {
        (true, false) => Outcome::Rows(rows),
        (false, false) => Outcome::Row(rows.into_iter().next()),
        (true, true) => Outcome::Values(rows.into_iter().filter_map(Row::into_first).collect()),
        (false, true) => Outcome::Value(rows.into_iter().next().and_then(Row::into_first)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_ids_are_sixteen_hex() {
        let id = row_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(row_id(), id);
    }

    #[test]
    fn ids_are_prepended_only_when_missing() {
        let insert = Insert::into_table("t").rows(vec!["name".into()], vec![vec!["a".into()], vec!["b".into()]]);
        let Statement::Insert(done) = assign_ids(Statement::Insert(insert), |_| StoreKind::Analytical) else {
            panic!("insert expected");
        };
        assert_eq!(done.columns, vec!["id", "name"]);
        let ids = inserted_ids(&done);
        assert_eq!(ids.len(), 2);
        assert!(uuid::Uuid::parse_str(&ids[0]).is_ok());

        let given = Insert::into_table("t").values([("id", SqlValue::from("fixed"))]);
        let Statement::Insert(kept) = assign_ids(Statement::Insert(given), |_| StoreKind::Row) else {
            panic!("insert expected");
        };
        assert_eq!(inserted_ids(&kept), vec!["fixed"]);
    }

    #[test]
    fn shapes_follow_flags() {
        let rows = vec![
            Row::new(vec!["n".into()], vec![json!(1)]),
            Row::new(vec!["n".into()], vec![json!(2)]),
        ];
        assert_eq!(shape(rows.clone(), ExecFlags::SCALARS), Outcome::Values(vec![json!(1), json!(2)]));
        assert_eq!(shape(rows.clone(), ExecFlags::SCALAR), Outcome::Value(Some(json!(1))));
        assert_eq!(shape(Vec::new(), ExecFlags::ROW), Outcome::Row(None));
        assert_eq!(shape(rows, ExecFlags::ROWS).into_rows().len(), 2);
    }
}
