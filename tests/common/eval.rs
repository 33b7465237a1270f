//! Evaluates the statement model against in-memory tables.
//!
//! Comparison follows SQL: nulls match nothing except `IS [NOT] NULL`, ascending order puts
//! nulls last, descending puts them first. Uniqueness of `id` and of every declared unique
//! column is enforced on insert and update.

use crudkit::error::ExecFailure;
use crudkit::models;
use crudkit::sql::{CompareOp, Condition, Direction, Projection, Select, SqlValue, Statement};
use crudkit::store::Row;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub type Tables = BTreeMap<String, Vec<Row>>;

pub enum Applied {
    Rows(Vec<Row>),
    Affected(u64),
}

pub fn run(tables: &mut Tables, stmt: &Statement) -> Result<Applied, ExecFailure> {
    match stmt {
        Statement::Select(s) => Ok(Applied::Rows(select(tables, s))),
        Statement::Insert(i) => {
            let table = tables.entry(i.table.clone()).or_default();
            let mut ids = Vec::with_capacity(i.rows.len());
            for values in &i.rows {
                let row = Row::new(i.columns.clone(), values.iter().map(SqlValue::to_json).collect());
                check_unique(&i.table, table, &row, None)?;
                ids.push(Row::new(
                    vec!["id".into()],
                    vec![row.get("id").cloned().unwrap_or(Value::Null)],
                ));
                table.push(row);
            }
            Ok(Applied::Rows(ids))
        }
        Statement::Update(u) => {
            let table = tables.entry(u.table.clone()).or_default();
            let mut affected = 0;
            for idx in 0..table.len() {
                if !u.conditions.iter().all(|c| matches(&table[idx], c)) {
                    continue;
                }
                let mut row = table[idx].clone();
                for (column, value) in &u.assignments {
                    set(&mut row, column, value.to_json());
                }
                check_unique(&u.table, table, &row, Some(idx))?;
                table[idx] = row;
                affected += 1;
            }
            Ok(Applied::Affected(affected))
        }
        Statement::Delete(d) => {
            let table = tables.entry(d.table.clone()).or_default();
            let before = table.len();
            table.retain(|r| !d.conditions.iter().all(|c| matches(r, c)));
            Ok(Applied::Affected((before - table.len()) as u64))
        }
    }
}

pub fn select(tables: &Tables, s: &Select) -> Vec<Row> {
    let mut rows: Vec<Row> = tables
        .get(&s.table)
        .map(|t| t.iter().filter(|r| s.conditions.iter().all(|c| matches(r, c))).cloned().collect())
        .unwrap_or_default();
    if s.projection == Projection::Count {
        return vec![Row::new(vec!["total".into()], vec![Value::from(rows.len() as u64)])];
    }
    rows.sort_by(|a, b| {
        s.order_by
            .iter()
            .map(|o| {
                let ord = order_nulls_last(cell(a, &o.column), cell(b, &o.column));
                match o.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    let offset = s.offset.unwrap_or(0) as usize;
    let limit = s.limit.map_or(usize::MAX, |l| l as usize);
    let columns = s.projected_columns();
    rows.into_iter()
        .skip(offset)
        .take(limit)
        .map(|r| {
            if columns.is_empty() {
                r
            } else {
                Row::new(
                    columns.to_vec(),
                    columns.iter().map(|c| cell(&r, c).clone()).collect(),
                )
            }
        })
        .collect()
}

static NULL: Value = Value::Null;

fn cell<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

fn set(row: &mut Row, column: &str, value: Value) {
    match row.columns.iter().position(|c| c == column) {
        Some(i) => row.values[i] = value,
        None => {
            row.columns.push(column.to_string());
            row.values.push(value);
        }
    }
}

fn check_unique(table: &str, rows: &[Row], row: &Row, skip: Option<usize>) -> Result<(), ExecFailure> {
    let mut unique = vec!["id"];
    if let Some(decl) = models::tables().into_iter().find(|t| t.name == table) {
        unique.extend(decl.unique);
    }
    for column in unique {
        let value = cell(row, column);
        if value.is_null() {
            continue;
        }
        let taken = rows
            .iter()
            .enumerate()
            .any(|(i, other)| Some(i) != skip && cell(other, column) == value);
        if taken {
            return Err(ExecFailure::integrity(format!(
                "duplicate key value violates unique constraint on {}.{}",
                table, column
            )));
        }
    }
    Ok(())
}

/// SQL comparison; None when either side is null or the types differ.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn order_nulls_last(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn matches(row: &Row, cond: &Condition) -> bool {
    match cond {
        Condition::Compare { column, op, value } => {
            let v = cell(row, column);
            if value.is_null() {
                return match op {
                    CompareOp::Eq => v.is_null(),
                    CompareOp::Ne => !v.is_null(),
                    _ => false,
                };
            }
            let Some(ord) = compare(v, &value.to_json()) else {
                return false;
            };
            match op {
                CompareOp::Eq => ord == Ordering::Equal,
                CompareOp::Ne => ord != Ordering::Equal,
                CompareOp::Gt => ord == Ordering::Greater,
                CompareOp::Ge => ord != Ordering::Less,
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::Le => ord != Ordering::Greater,
            }
        }
        Condition::Like { column, pattern } => match cell(row, column) {
            Value::String(s) => like(s.as_bytes(), pattern.as_bytes()),
            _ => false,
        },
        Condition::In { column, values, negated } => {
            let v = cell(row, column);
            if v.is_null() {
                return false;
            }
            let found = values
                .iter()
                .any(|x| compare(v, &x.to_json()) == Some(Ordering::Equal));
            found != *negated
        }
        Condition::Range { column, lo, hi } => {
            let v = cell(row, column);
            let above = lo
                .as_ref()
                .map_or(true, |lo| matches!(compare(v, &lo.to_json()), Some(Ordering::Greater | Ordering::Equal)));
            let below = hi
                .as_ref()
                .map_or(true, |hi| matches!(compare(v, &hi.to_json()), Some(Ordering::Less | Ordering::Equal)));
            !v.is_null() && above && below
        }
        Condition::AnyOf(inner) => inner.iter().any(|c| matches(row, c)),
    }
}

/// LIKE with `%` and `_` wildcards.
fn like(s: &[u8], p: &[u8]) -> bool {
    match p.split_first() {
        None => s.is_empty(),
        Some((b'%', rest)) => (0..=s.len()).any(|i| like(&s[i..], rest)),
        Some((b'_', rest)) => !s.is_empty() && like(&s[1..], rest),
        Some((c, rest)) => s.first() == Some(c) && like(&s[1..], rest),
    }
}
