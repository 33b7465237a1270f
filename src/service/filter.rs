//! Filter, sort and field-list parsing against a table's declared columns.
//! Every column is checked before it reaches a statement; operators come from a closed set.

use crate::config::{ColumnDecl, TableDecl};
use crate::error::{AppError, RespCode};
use crate::schema::bind::coerce_primitive;
use crate::schema::{BoundValue, Primitive};
use crate::sql::{CompareOp, Condition, Direction, OrderBy, SqlValue};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Compare(CompareOp),
    Like,
    In,
    NotIn,
    /// Inclusive `[lo, hi]`; either bound may be null.
    Range,
    /// Range whose bounds are date-times.
    DateTime,
}

impl FilterOp {
    pub fn parse(op: &str) -> Option<Self> {
        let op = match op.trim() {
            "eq" | "=" | "==" => FilterOp::Compare(CompareOp::Eq),
            "!=" | "<>" => FilterOp::Compare(CompareOp::Ne),
            ">" => FilterOp::Compare(CompareOp::Gt),
            ">=" => FilterOp::Compare(CompareOp::Ge),
            "<" => FilterOp::Compare(CompareOp::Lt),
            "<=" => FilterOp::Compare(CompareOp::Le),
            "like" => FilterOp::Like,
            "in" => FilterOp::In,
            "notin" => FilterOp::NotIn,
            "range" => FilterOp::Range,
            "datetime" => FilterOp::DateTime,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterSpec {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FilterSpec {
    pub fn new(column: impl Into<String>, op: FilterOp, value: Value) -> Self {
        FilterSpec {
            column: column.into(),
            op,
            value,
        }
    }
}

/// Parse a `{column: {op, value}}` map. Accepts the map as JSON text too.
pub fn parse_filters(raw: &Value) -> Result<Vec<FilterSpec>, AppError> {
    let map: Map<String, Value> = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Object(m) => m.clone(),
        Value::String(s) => match serde_json::from_str(s) {
            Ok(Value::Object(m)) => m,
            _ => return Err(AppError::with_data(RespCode::ParamsValueError, json!({ "field": "query" }))),
        },
        _ => return Err(AppError::with_data(RespCode::ParamsValueError, json!({ "field": "query" }))),
    };
    let mut out = Vec::with_capacity(map.len());
    for (column, entry) in map {
        let Value::Object(entry) = entry else {
            return Err(AppError::with_data(RespCode::ParamsValueError, json!({ "field": column })));
        };
        let op = entry
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::with_data(RespCode::ParamsMissed, json!({ "field": format!("{}.op", column) })))?;
        let op = FilterOp::parse(op)
            .ok_or_else(|| AppError::with_data(RespCode::ParamsRangeError, json!({ "field": column, "op": op })))?;
        let value = entry.get("value").cloned().unwrap_or(Value::Null);
        out.push(FilterSpec { column, op, value });
    }
    Ok(out)
}

fn value_error(column: &str) -> AppError {
    AppError::with_data(RespCode::ParamsValueError, json!({ "field": column }))
}

/// Coerce a raw filter value to the column's type.
fn column_value(col: &ColumnDecl, raw: &Value) -> Result<SqlValue, AppError> {
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    coerce_primitive(col.type_.into(), raw)
        .map(|v| v.to_sql())
        .ok_or_else(|| value_error(col.name))
}

fn bound(col: &ColumnDecl, raw: Option<&Value>, datetime: bool) -> Result<Option<SqlValue>, AppError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(v) if datetime => coerce_primitive(Primitive::DateTime, v)
            .map(|b: BoundValue| Some(b.to_sql()))
            .ok_or_else(|| value_error(col.name)),
        Some(v) => column_value(col, v).map(Some),
    }
}

/// Validate one filter against the table and turn it into a condition.
pub fn to_condition(table: &TableDecl, spec: &FilterSpec) -> Result<Condition, AppError> {
    let col = table.resolve_column(&spec.column)?;
    let cond = match spec.op {
        FilterOp::Compare(op) => {
            if spec.value.is_null() && !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                return Err(value_error(col.name));
            }
            Condition::compare(col.name, op, column_value(col, &spec.value)?)
        }
        FilterOp::Like => match &spec.value {
            Value::String(p) => Condition::like(col.name, p.clone()),
            _ => return Err(value_error(col.name)),
        },
        FilterOp::In | FilterOp::NotIn => {
            let Value::Array(items) = &spec.value else {
                return Err(value_error(col.name));
            };
            let values = items
                .iter()
                .map(|v| column_value(col, v))
                .collect::<Result<Vec<_>, _>>()?;
            if spec.op == FilterOp::In {
                Condition::is_in(col.name, values)
            } else {
                Condition::not_in(col.name, values)
            }
        }
        FilterOp::Range | FilterOp::DateTime => {
            let Value::Array(items) = &spec.value else {
                return Err(value_error(col.name));
            };
            if items.len() != 2 {
                return Err(value_error(col.name));
            }
            let datetime = spec.op == FilterOp::DateTime;
            Condition::range(
                col.name,
                bound(col, items.first(), datetime)?,
                bound(col, items.get(1), datetime)?,
            )
        }
    };
    Ok(cond)
}

pub fn to_conditions(table: &TableDecl, specs: &[FilterSpec]) -> Result<Vec<Condition>, AppError> {
    specs.iter().map(|s| to_condition(table, s)).collect()
}

/// Split a sort entry into column and direction. `-` means descending, `+` or nothing ascending.
/// Blank entries yield None.
pub fn parse_sort_entry(entry: &str) -> Option<(&str, Direction)> {
    let (column, direction) = match entry.trim() {
        e if e.starts_with('-') => (&e[1..], Direction::Desc),
        e if e.starts_with('+') => (&e[1..], Direction::Asc),
        e => (e, Direction::Asc),
    };
    let column = column.trim();
    (!column.is_empty()).then_some((column, direction))
}

/// Ordered sort keys, each checked against the declared columns.
pub fn sort_order<S: AsRef<str>>(table: &TableDecl, entries: &[S]) -> Result<Vec<OrderBy>, AppError> {
    entries
        .iter()
        .filter_map(|e| parse_sort_entry(e.as_ref()))
        .map(|(column, direction)| {
            table.resolve_column(column).map(|c| OrderBy {
                column: c.name.to_string(),
                direction,
            })
        })
        .collect()
}

/// Requested projection, or every declared column when none was asked for.
pub fn resolve_fields<S: AsRef<str>>(table: &TableDecl, fields: &[S]) -> Result<Vec<String>, AppError> {
    if fields.is_empty() {
        return Ok(table.column_names().into_iter().map(String::from).collect());
    }
    Ok(table
        .resolve_columns(fields)?
        .into_iter()
        .map(|c| c.name.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnType, StoreKind};

    fn logs() -> TableDecl {
        TableDecl::new(
            "logs",
            StoreKind::Analytical,
            vec![
                ColumnDecl::new("id", ColumnType::Text),
                ColumnDecl::new("status", ColumnType::Int),
                ColumnDecl::new("method", ColumnType::Text),
                ColumnDecl::new("created_at", ColumnType::DateTime),
            ],
        )
    }

    #[test]
    fn parses_operator_vocabulary() {
        assert_eq!(FilterOp::parse("=="), Some(FilterOp::Compare(CompareOp::Eq)));
        assert_eq!(FilterOp::parse("eq"), Some(FilterOp::Compare(CompareOp::Eq)));
        assert_eq!(FilterOp::parse(">="), Some(FilterOp::Compare(CompareOp::Ge)));
        assert_eq!(FilterOp::parse("notin"), Some(FilterOp::NotIn));
        assert_eq!(FilterOp::parse("; drop table"), None);
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = parse_filters(&json!({ "status": { "op": "~", "value": 1 } })).unwrap_err();
        assert_eq!(err.resp_code(), RespCode::ParamsRangeError);
    }

    #[test]
    fn unknown_column_reports_declared_set() {
        let specs = parse_filters(&json!({ "colour": { "op": "==", "value": "red" } })).unwrap();
        let err = to_conditions(&logs(), &specs).unwrap_err();
        match err {
            AppError::Api { code, data, .. } => {
                assert_eq!(code, RespCode::ParamsRangeError);
                assert_eq!(data, Some(json!(["id", "status", "method", "created_at"])));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn values_are_coerced_to_column_types() {
        let specs = parse_filters(&json!({
            "status": { "op": "in", "value": ["200", 404] },
            "created_at": { "op": "datetime", "value": ["2024-01-01 00:00:00", null] }
        }))
        .unwrap();
        let conds = to_conditions(&logs(), &specs).unwrap();
        assert!(conds.contains(&Condition::is_in("status", vec![SqlValue::Int(200), SqlValue::Int(404)])));
        assert!(conds.iter().any(|c| matches!(
            c,
            Condition::Range { column, lo: Some(SqlValue::DateTime(_)), hi: None } if column == "created_at"
        )));
    }

    #[test]
    fn non_numeric_compare_value_is_value_error() {
        let specs = parse_filters(&json!({ "status": { "op": ">", "value": "1 OR 1=1" } })).unwrap();
        let err = to_conditions(&logs(), &specs).unwrap_err();
        assert_eq!(err.resp_code(), RespCode::ParamsValueError);
    }

    #[test]
    fn sort_prefixes_and_blanks() {
        assert_eq!(parse_sort_entry("-created_at"), Some(("created_at", Direction::Desc)));
        assert_eq!(parse_sort_entry("+status"), Some(("status", Direction::Asc)));
        assert_eq!(parse_sort_entry("status"), Some(("status", Direction::Asc)));
        assert_eq!(parse_sort_entry(""), None);
        assert_eq!(parse_sort_entry("-"), None);

        let order = sort_order(&logs(), &["-created_at", "", "status"]).unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].direction, Direction::Desc);

        let err = sort_order(&logs(), &["status; DROP TABLE logs"]).unwrap_err();
        assert_eq!(err.resp_code(), RespCode::ParamsRangeError);
    }

    #[test]
    fn empty_field_list_means_all_columns() {
        assert_eq!(resolve_fields::<&str>(&logs(), &[]).unwrap().len(), 4);
        assert_eq!(resolve_fields(&logs(), &["status"]).unwrap(), vec!["status"]);
        assert!(resolve_fields(&logs(), &["nope"]).is_err());
    }

    #[test]
    fn null_only_pairs_with_equality() {
        let specs = parse_filters(&json!({ "method": { "op": "==", "value": null } })).unwrap();
        let conds = to_conditions(&logs(), &specs).unwrap();
        assert_eq!(conds, vec![Condition::compare("method", CompareOp::Eq, SqlValue::Null)]);

        for op in [">", ">=", "<", "<="] {
            let specs = parse_filters(&json!({ "status": { "op": op, "value": null } })).unwrap();
            let err = to_conditions(&logs(), &specs).unwrap_err();
            assert_eq!(err.resp_code(), RespCode::ParamsValueError);
        }
    }
}
