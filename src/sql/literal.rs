//! Renders statements for the analytical store as literal SQL text.
//! Batch inserts split into a statement shell and a JSONEachRow body sent separately.

use crate::sql::{null_test, Condition, Insert, Projection, Select, SqlValue, Statement, DATETIME_FORMAT};
use serde_json::{Map, Value};

/// Backtick-quoted identifier.
pub fn ident(s: &str) -> String {
    format!("`{}`", s.replace('\\', "\\\\").replace('`', "\\`"))
}

/// One value as a ClickHouse literal.
pub fn literal(v: &SqlValue) -> String {
    match v {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        SqlValue::Int(n) => n.to_string(),
        SqlValue::Float(f) if f.is_nan() => "nan".to_string(),
        SqlValue::Float(f) if f.is_infinite() => if *f > 0.0 { "inf" } else { "-inf" }.to_string(),
        SqlValue::Float(f) => format!("{:?}", f),
        SqlValue::Text(s) => quote_str(s),
        SqlValue::DateTime(d) => quote_str(&d.format(DATETIME_FORMAT).to_string()),
        SqlValue::Json(j) => quote_str(&j.to_string()),
    }
}

fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn condition_sql(cond: &Condition) -> String {
    match cond {
        Condition::Compare { column, op, value } => match null_test(*op, value) {
            Some(test) => format!("{} {}", ident(column), test),
            None => format!("{} {} {}", ident(column), op.symbol(), literal(value)),
        },
        Condition::Like { column, pattern } => {
            format!("{} LIKE {}", ident(column), quote_str(pattern))
        }
        Condition::In {
            column,
            values,
            negated,
        } => {
            if values.is_empty() {
                return if *negated { "1 = 1".into() } else { "1 = 0".into() };
            }
            let items: Vec<String> = values.iter().map(literal).collect();
            let kw = if *negated { "NOT IN" } else { "IN" };
            format!("{} {} ({})", ident(column), kw, items.join(", "))
        }
        Condition::Range { column, lo, hi } => {
            let mut parts = Vec::new();
            if let Some(lo) = lo {
                parts.push(format!("{} >= {}", ident(column), literal(lo)));
            }
            if let Some(hi) = hi {
                parts.push(format!("{} <= {}", ident(column), literal(hi)));
            }
            if parts.is_empty() {
                "1 = 1".into()
            } else {
                format!("({})", parts.join(" AND "))
            }
        }
        Condition::AnyOf(inner) => {
            if inner.is_empty() {
                return "1 = 0".into();
            }
            let parts: Vec<String> = inner.iter().map(condition_sql).collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

fn where_clause(conditions: &[Condition]) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = conditions.iter().map(condition_sql).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

pub fn select(s: &Select) -> String {
    let cols = match &s.projection {
        Projection::Count => "count() AS total".to_string(),
        Projection::Columns(c) if c.is_empty() => "*".to_string(),
        Projection::Columns(c) => c.iter().map(|c| ident(c)).collect::<Vec<_>>().join(", "),
    };
    let mut sql = format!("SELECT {} FROM {}{}", cols, ident(&s.table), where_clause(&s.conditions));
    if s.projection != Projection::Count {
        if !s.order_by.is_empty() {
            let order: Vec<String> = s
                .order_by
                .iter()
                .map(|o| format!("{} {}", ident(&o.column), o.direction.keyword()))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }
        if let Some(n) = s.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = s.offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
    }
    sql
}

/// Single-row insert with values inlined.
pub fn insert_single(i: &Insert) -> String {
    let cols: Vec<String> = i.columns.iter().map(|c| ident(c)).collect();
    let values: Vec<String> = i
        .rows
        .first()
        .map(|r| r.iter().map(literal).collect())
        .unwrap_or_default();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        ident(&i.table),
        cols.join(", "),
        values.join(", ")
    )
}

/// Statement shell for a batch insert; the rows travel as the request body.
pub fn insert_shell(i: &Insert) -> String {
    let cols: Vec<String> = i.columns.iter().map(|c| ident(c)).collect();
    format!(
        "INSERT INTO {} ({}) FORMAT JSONEachRow",
        ident(&i.table),
        cols.join(", ")
    )
}

/// Batch rows as newline-delimited JSON objects keyed by column.
pub fn insert_rows(i: &Insert) -> String {
    let mut body = String::new();
    for row in &i.rows {
        let obj: Map<String, Value> = i
            .columns
            .iter()
            .cloned()
            .zip(row.iter().map(SqlValue::to_json))
            .collect();
        body.push_str(&Value::Object(obj).to_string());
        body.push('\n');
    }
    body
}

/// Literal SQL for the statements the analytical store accepts; None for update and delete.
pub fn render(stmt: &Statement) -> Option<String> {
    match stmt {
        Statement::Select(s) => Some(select(s)),
        Statement::Insert(i) if i.is_batch() => Some(insert_shell(i)),
        Statement::Insert(i) => Some(insert_single(i)),
        Statement::Update(_) | Statement::Delete(_) => None,
    }
}
