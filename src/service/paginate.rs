//! Offset pagination with a count-first `{total, data}` envelope.

use crate::config::TableDecl;
use crate::error::{AppError, RespCode};
use crate::schema::BoundMap;
use crate::service::filter::{parse_filters, sort_order, FilterSpec};
use crate::sql::Select;
use crate::store::{Executor, Row, WorkUnit};
use serde::Serialize;
use serde_json::Value;

pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination controls plus the optional projection and filter map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageRequest {
    pub page: i64,
    /// 0 returns every matching row.
    pub size: i64,
    pub sort: Vec<String>,
    pub fields: Vec<String>,
    pub filters: Vec<FilterSpec>,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        PageRequest {
            page,
            size,
            ..Default::default()
        }
    }

    pub fn sorted<I, S>(mut self, sort: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = sort.into_iter().map(Into::into).collect();
        self
    }

    /// Read `page`, `size`, `sort`, `field` and `query` from bound parameters.
    pub fn from_bound(params: &BoundMap) -> Result<Self, AppError> {
        let page = params.get_i64("page").ok_or(RespCode::ParamsMissed)?;
        let size = params.get_i64("size").ok_or(RespCode::ParamsMissed)?;
        let list = |key: &str| params.get(key).map(|v| v.string_list()).unwrap_or_default();
        let filters = match params.get("query") {
            Some(q) => parse_filters(&q.to_json())?,
            None => Vec::new(),
        };
        Ok(PageRequest {
            page,
            size,
            sort: list("sort"),
            fields: list("field"),
            filters,
        })
    }

    pub fn is_all(&self) -> bool {
        self.size == 0
    }

    /// Reject out-of-range controls; returns `(limit, offset)` or None for all rows.
    pub fn window(&self) -> Result<Option<(u64, u64)>, AppError> {
        if self.is_all() {
            return Ok(None);
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.size) || self.page < 1 {
            return Err(AppError::with_message(
                RespCode::ParamsRangeError,
                format!("size must be 0 or within 1..={} and page at least 1", MAX_PAGE_SIZE),
            ));
        }
        let size = self.size as u64;
        let offset = (self.page as u64 - 1)
            .checked_mul(size)
            .filter(|o| *o <= i64::MAX as u64)
            .ok_or_else(|| AppError::with_message(RespCode::ParamsRangeError, "page is beyond the last addressable row"))?;
        Ok(Some((size, offset)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub total: u64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// Apply a row-formatting function to every element.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            total: self.total,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

impl<T: Serialize> Page<T> {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn count_of(v: Option<Value>) -> u64 {
    match v {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Paginate a filtered select. Sort keys are validated against `table` before use.
///
/// The count runs against the same filters before limit and offset are applied,
/// except for the all-rows sentinel where `total` is the returned row count.
pub async fn paginate(
    executor: &Executor,
    table: &TableDecl,
    mut select: Select,
    req: &PageRequest,
    mut unit: Option<&mut dyn WorkUnit>,
) -> Result<Page<Row>, AppError> {
    let window = req.window()?;
    for order in sort_order(table, &req.sort)? {
        select.order_by.push(order);
    }
    let Some((limit, offset)) = window else {
        let data = executor.fetch_all(select, unit).await?;
        return Ok(Page {
            total: data.len() as u64,
            data,
        });
    };
    let count_unit = unit.as_mut().map(|u| &mut **u as &mut dyn WorkUnit);
    let total = count_of(executor.fetch_scalar(select.count(), count_unit).await?);
    let data = executor
        .fetch_all(select.limit(limit).offset(offset), unit)
        .await?;
    Ok(Page { total, data })
}

/// Replace nulls in a column with a placeholder for display.
pub fn safe_column(row: &mut Row, column: &str, default: &str) {
    if let Some(i) = row.columns.iter().position(|c| c == column) {
        if row.values[i].is_null() {
            row.values[i] = Value::String(default.to_string());
        }
    }
}

/// `safe_column` with `-` over every nullable column of the table.
pub fn safe_columns(table: &TableDecl, mut row: Row) -> Row {
    for c in table.columns.iter().filter(|c| c.nullable) {
        safe_column(&mut row, c.name, "-");
    }
    row
}

/// LIKE pattern matching `s` anywhere.
pub fn contains_pattern(s: &str) -> String {
    format!("%{}%", s)
}
