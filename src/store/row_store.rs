//! Transactional row store: per-call work units over a PostgreSQL pool.

use crate::error::ExecFailure;
use crate::sql::{bind_value, render, QueryBuf, Statement};
use crate::store::Row;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Transaction};

/// Connection factory for the row store.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Acquire a fresh work unit. Never shared between calls.
    async fn begin(&self) -> Result<Box<dyn WorkUnit>, ExecFailure>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), ExecFailure>;

    async fn close(&self) {}
}

/// One call's transactional context.
#[async_trait]
pub trait WorkUnit: Send {
    /// Run a select, or an insert returning the `id` of every new row.
    async fn fetch(&mut self, stmt: &Statement) -> Result<Vec<Row>, ExecFailure>;

    /// Run an update or delete; returns the affected row count.
    async fn execute(&mut self, stmt: &Statement) -> Result<u64, ExecFailure>;

    /// Run schema DDL inside the unit.
    async fn execute_ddl(&mut self, ddl: &str) -> Result<(), ExecFailure>;

    /// Discard everything done so far. Later statements start a new transaction.
    async fn rollback(&mut self);

    fn rolled_back(&self) -> bool;

    /// Commit unless a rollback already happened, then release the connection.
    async fn close(self: Box<Self>) -> Result<(), ExecFailure>;
}

pub struct PgRowStore {
    pool: PgPool,
}

impl PgRowStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(PgRowStore { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PgRowStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn begin(&self) -> Result<Box<dyn WorkUnit>, ExecFailure> {
        Ok(Box::new(PgWorkUnit {
            pool: self.pool.clone(),
            tx: None,
            rolled_back: false,
        }))
    }

    async fn ping(&self) -> Result<(), ExecFailure> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Transaction opened lazily on the first statement.
pub struct PgWorkUnit {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    rolled_back: bool,
}

impl PgWorkUnit {
    async fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, ExecFailure> {
        if self.tx.is_none() {
            self.tx = Some(self.pool.begin().await.map_err(classify)?);
        }
        self.tx
            .as_mut()
            .ok_or_else(|| ExecFailure::driver("transaction unavailable"))
    }
}

#[async_trait]
impl WorkUnit for PgWorkUnit {
    async fn fetch(&mut self, stmt: &Statement) -> Result<Vec<Row>, ExecFailure> {
        let q: QueryBuf = render(stmt);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let tx = self.tx().await?;
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = bind_value(query, p);
        }
        let rows = query.fetch_all(&mut **tx).await.map_err(classify)?;
        Ok(rows.iter().map(pg_row).collect())
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, ExecFailure> {
        let q: QueryBuf = render(stmt);
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let tx = self.tx().await?;
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = bind_value(query, p);
        }
        let done = query.execute(&mut **tx).await.map_err(classify)?;
        Ok(done.rows_affected())
    }

    async fn execute_ddl(&mut self, ddl: &str) -> Result<(), ExecFailure> {
        tracing::debug!(sql = %ddl, "ddl");
        let tx = self.tx().await?;
        sqlx::query(ddl).execute(&mut **tx).await.map_err(classify)?;
        Ok(())
    }

    async fn rollback(&mut self) {
        self.rolled_back = true;
        if let Some(tx) = self.tx.take() {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %e, "rollback failed");
            }
        }
    }

    fn rolled_back(&self) -> bool {
        self.rolled_back
    }

    async fn close(self: Box<Self>) -> Result<(), ExecFailure> {
        let PgWorkUnit { tx, rolled_back, .. } = *self;
        match tx {
            Some(tx) if !rolled_back => tx.commit().await.map_err(classify),
            // dropping an open transaction rolls it back
            _ => Ok(()),
        }
    }
}

/// Integrity violations are reported apart from other driver failures.
pub fn classify(e: sqlx::Error) -> ExecFailure {
    match &e {
        sqlx::Error::Database(db) => match db.kind() {
            sqlx::error::ErrorKind::UniqueViolation
            | sqlx::error::ErrorKind::ForeignKeyViolation
            | sqlx::error::ErrorKind::NotNullViolation
            | sqlx::error::ErrorKind::CheckViolation => ExecFailure::integrity(db.message().to_string()),
            _ => ExecFailure::driver(e.to_string()),
        },
        _ => ExecFailure::driver(e.to_string()),
    }
}

fn pg_row(row: &PgRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut out = Row::default();
    for col in row.columns() {
        let name = col.name();
        out.columns.push(name.to_string());
        out.values.push(cell_to_value(row, name));
    }
    out
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.naive_utc().format(crate::sql::DATETIME_FORMAT).to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format(crate::sql::DATETIME_FORMAT).to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
