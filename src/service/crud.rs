//! Generic CRUD over declared tables, built on the statement model and executor.

use crate::config::{TableDecl, ID_COLUMN};
use crate::error::{AppError, FailureKind, RespCode};
use crate::response::Reply;
use crate::schema::BoundMap;
use crate::service::filter::{resolve_fields, to_conditions};
use crate::service::paginate::{paginate, Page, PageRequest};
use crate::sql::{Condition, Delete, Insert, Select, SqlValue, Update};
use crate::store::{Executor, Row, WorkUnit};
use serde_json::json;

pub const UPDATED_AT: &str = "updated_at";
pub const CREATED_AT: &str = "created_at";

pub struct CrudService;

impl CrudService {
    /// Insert one record. Columns are checked against the table; `created_at` is filled when declared.
    /// An empty record is `ParamsMissed`; a uniqueness violation is `KeyRepeat`.
    pub async fn create(
        executor: &Executor,
        table: &TableDecl,
        values: &BoundMap,
        unit: Option<&mut dyn WorkUnit>,
    ) -> Result<Reply, AppError> {
        if values.is_empty() {
            return Err(AppError::code(RespCode::ParamsMissed));
        }
        let mut pairs = values.to_sql_pairs();
        let names: Vec<&str> = pairs.iter().map(|(c, _)| c.as_str()).collect();
        table.resolve_columns(&names)?;
        if table.has_column(CREATED_AT) && !pairs.iter().any(|(c, _)| c == CREATED_AT) {
            pairs.push((CREATED_AT.to_string(), SqlValue::DateTime(chrono::Utc::now().naive_utc())));
        }
        let insert = Insert::into_table(table.name).values(pairs);
        match executor.insert(insert, unit).await {
            Ok(ids) => Ok(Reply::created(json!({ "id": ids.into_iter().next() }))),
            Err(e) if e.kind == FailureKind::Integrity => {
                tracing::info!(table = %table.name, message = %e.message, "duplicate key");
                Err(AppError::code(RespCode::KeyRepeat))
            }
            Err(e) => Err(e.into_app_error()),
        }
    }

    /// Fetch one record by id, optionally projected to `fields`.
    pub async fn read<S: AsRef<str>>(
        executor: &Executor,
        table: &TableDecl,
        id: &str,
        fields: &[S],
        unit: Option<&mut dyn WorkUnit>,
    ) -> Result<Reply, AppError> {
        let columns = resolve_fields(table, fields)?;
        let select = Select::from(table.name)
            .columns(columns)
            .filter(Condition::eq(ID_COLUMN, id));
        match executor.fetch_one(select, unit).await? {
            Some(row) => Ok(Reply::ok(row)),
            None => Err(AppError::code(RespCode::NotFound)),
        }
    }

    /// Update one record by id. An empty change set is `ParamsMissed`; the id itself is immutable.
    pub async fn update(
        executor: &Executor,
        table: &TableDecl,
        id: &str,
        values: &BoundMap,
        unit: Option<&mut dyn WorkUnit>,
    ) -> Result<Reply, AppError> {
        if values.is_empty() {
            return Err(AppError::code(RespCode::ParamsMissed));
        }
        if values.contains(ID_COLUMN) {
            return Err(AppError::with_data(RespCode::IllegalParams, json!({ "field": ID_COLUMN })));
        }
        let mut update = Update::table(table.name);
        for (column, value) in values.to_sql_pairs() {
            table.resolve_column(&column)?;
            update = update.set(column, value);
        }
        if table.has_column(UPDATED_AT) && !values.contains(UPDATED_AT) {
            update = update.set(UPDATED_AT, chrono::Utc::now().naive_utc());
        }
        let affected = executor
            .modify(update.filter(Condition::eq(ID_COLUMN, id)), unit)
            .await?;
        if affected == 0 {
            return Err(AppError::code(RespCode::NotFound));
        }
        Ok(Reply::no_content())
    }

    /// Delete records by id, dependents first, inside the caller's work unit.
    /// A single id that matched nothing is `NotFound`; a list always succeeds.
    pub async fn delete(
        executor: &Executor,
        table: &TableDecl,
        ids: &[String],
        unit: &mut dyn WorkUnit,
    ) -> Result<Reply, AppError> {
        if ids.is_empty() {
            return Err(AppError::code(RespCode::ParamsMissed));
        }
        let keys: Vec<SqlValue> = ids.iter().map(|id| SqlValue::from(id.as_str())).collect();
        for dep in &table.dependents {
            let removed = executor
                .modify(Delete::from(dep.table).filter(Condition::is_in(dep.foreign_key, keys.clone())), Some(&mut *unit))
                .await?;
            tracing::debug!(table = %dep.table, removed, "cascade delete");
        }
        let affected = executor
            .modify(Delete::from(table.name).filter(Condition::is_in(ID_COLUMN, keys)), Some(unit))
            .await?;
        if ids.len() == 1 && affected == 0 {
            return Err(AppError::code(RespCode::NotFound));
        }
        Ok(Reply::no_content())
    }

    /// Paginated search with projection and filters from the request.
    pub async fn paginate(
        executor: &Executor,
        table: &TableDecl,
        req: &PageRequest,
        unit: Option<&mut dyn WorkUnit>,
    ) -> Result<Page<Row>, AppError> {
        let columns = resolve_fields(table, &req.fields)?;
        let mut select = Select::from(table.name).columns(columns);
        for cond in to_conditions(table, &req.filters)? {
            select = select.filter(cond);
        }
        paginate(executor, table, select, req, unit).await
    }
}
