//! Renders statements for the row store: quoted identifiers, every value a `$n` parameter.

use crate::config::ID_COLUMN;
use crate::sql::{null_test, Condition, Delete, Insert, Projection, Select, SqlValue, Statement, Update};

/// Quote identifier for PostgreSQL (safe: only declared names reach here).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    /// Placeholder for a value. NULL is inlined so it takes the column's type.
    fn push_param(&mut self, v: SqlValue) -> String {
        if v.is_null() {
            return "NULL".to_string();
        }
        self.params.push(v);
        format!("${}", self.params.len())
    }
}

/// Render any statement as prepared SQL plus ordered parameters.
pub fn render(stmt: &Statement) -> QueryBuf {
    match stmt {
        Statement::Select(s) => select(s),
        Statement::Insert(i) => insert(i),
        Statement::Update(u) => update(u),
        Statement::Delete(d) => delete(d),
    }
}

fn condition_sql(q: &mut QueryBuf, cond: &Condition) -> String {
    match cond {
        Condition::Compare { column, op, value } => {
            if let Some(test) = null_test(*op, value) {
                return format!("{} {}", quoted(column), test);
            }
            let ph = q.push_param(value.clone());
            format!("{} {} {}", quoted(column), op.symbol(), ph)
        }
        Condition::Like { column, pattern } => {
            let ph = q.push_param(SqlValue::Text(pattern.clone()));
            format!("{} LIKE {}", quoted(column), ph)
        }
        Condition::In {
            column,
            values,
            negated,
        } => {
            if values.is_empty() {
                return if *negated { "1 = 1".into() } else { "1 = 0".into() };
            }
            let placeholders: Vec<String> = values.iter().map(|v| q.push_param(v.clone())).collect();
            let kw = if *negated { "NOT IN" } else { "IN" };
            format!("{} {} ({})", quoted(column), kw, placeholders.join(", "))
        }
        Condition::Range { column, lo, hi } => {
            let mut parts = Vec::new();
            if let Some(lo) = lo {
                let ph = q.push_param(lo.clone());
                parts.push(format!("{} >= {}", quoted(column), ph));
            }
            if let Some(hi) = hi {
                let ph = q.push_param(hi.clone());
                parts.push(format!("{} <= {}", quoted(column), ph));
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
            let parts: Vec<String> = inner.iter().map(|c| condition_sql(q, c)).collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

fn where_clause(q: &mut QueryBuf, conditions: &[Condition]) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = conditions.iter().map(|c| condition_sql(q, c)).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

/// SELECT with optional filters, ORDER BY, LIMIT/OFFSET. Count projections ignore pagination.
pub fn select(s: &Select) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = match &s.projection {
        Projection::Count => "count(*) AS total".to_string(),
        Projection::Columns(c) if c.is_empty() => "*".to_string(),
        Projection::Columns(c) => c.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", "),
    };
    let where_sql = where_clause(&mut q, &s.conditions);
    let mut sql = format!("SELECT {} FROM {}{}", cols, quoted(&s.table), where_sql);
    if s.projection != Projection::Count {
        if !s.order_by.is_empty() {
            let order: Vec<String> = s
                .order_by
                .iter()
                .map(|o| format!("{} {}", quoted(&o.column), o.direction.keyword()))
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
    q.sql = sql;
    q
}

/// INSERT one or more rows, returning generated ids in row order.
pub fn insert(i: &Insert) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols: Vec<String> = i.columns.iter().map(|c| quoted(c)).collect();
    let mut tuples = Vec::with_capacity(i.rows.len());
    for row in &i.rows {
        let placeholders: Vec<String> = row.iter().map(|v| q.push_param(v.clone())).collect();
        tuples.push(format!("({})", placeholders.join(", ")));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES {} RETURNING {}",
        quoted(&i.table),
        cols.join(", "),
        tuples.join(", "),
        quoted(ID_COLUMN)
    );
    q
}

/// UPDATE with SET params first, then WHERE params.
pub fn update(u: &Update) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets: Vec<String> = u
        .assignments
        .iter()
        .map(|(col, v)| {
            let ph = q.push_param(v.clone());
            format!("{} = {}", quoted(col), ph)
        })
        .collect();
    let where_sql = where_clause(&mut q, &u.conditions);
    q.sql = format!("UPDATE {} SET {}{}", quoted(&u.table), sets.join(", "), where_sql);
    q
}

pub fn delete(d: &Delete) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, &d.conditions);
    q.sql = format!("DELETE FROM {}{}", quoted(&d.table), where_sql);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{CompareOp, Direction};

    #[test]
    fn select_numbers_params_in_condition_order() {
        let s = Select::from("user")
            .columns(["id", "account"])
            .filter(Condition::eq("valid", true))
            .filter(Condition::is_in("role", vec!["admin".into(), "user".into()]))
            .order_by("created_at", Direction::Desc)
            .limit(10)
            .offset(20);
        let q = select(&s);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"account\" FROM \"user\" WHERE \"valid\" = $1 AND \"role\" IN ($2, $3) ORDER BY \"created_at\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn count_drops_order_and_pagination() {
        let s = Select::from("user")
            .filter(Condition::compare("age", CompareOp::Ge, 18))
            .order_by("id", Direction::Asc)
            .limit(5);
        let q = select(&s.count());
        assert_eq!(q.sql, "SELECT count(*) AS total FROM \"user\" WHERE \"age\" >= $1");
    }

    #[test]
    fn empty_in_matches_nothing_and_any_of_groups() {
        let s = Select::from("user")
            .filter(Condition::is_in("id", vec![]))
            .filter(Condition::AnyOf(vec![
                Condition::like("account", "%ad%"),
                Condition::like("username", "%ad%"),
            ]));
        let q = select(&s);
        assert_eq!(
            q.sql,
            "SELECT * FROM \"user\" WHERE 1 = 0 AND (\"account\" LIKE $1 OR \"username\" LIKE $2)"
        );
    }

    #[test]
    fn batch_insert_returns_ids() {
        let i = Insert::into_table("user").rows(
            vec!["id".into(), "account".into()],
            vec![vec!["a".into(), "x".into()], vec!["b".into(), "y".into()]],
        );
        let q = insert(&i);
        assert_eq!(
            q.sql,
            "INSERT INTO \"user\" (\"id\", \"account\") VALUES ($1, $2), ($3, $4) RETURNING \"id\""
        );
        assert_eq!(q.params[2], SqlValue::Text("b".into()));
    }

    #[test]
    fn update_binds_set_before_where() {
        let u = Update::table("user").set("username", "n").filter(Condition::eq("id", "abc"));
        let q = update(&u);
        assert_eq!(q.sql, "UPDATE \"user\" SET \"username\" = $1 WHERE \"id\" = $2");
        assert_eq!(q.params, vec![SqlValue::from("n"), SqlValue::from("abc")]);
    }

    #[test]
    fn equality_with_null_becomes_is_null() {
        let s = Select::from("user")
            .filter(Condition::compare("phone", CompareOp::Eq, SqlValue::Null))
            .filter(Condition::compare("email", CompareOp::Ne, SqlValue::Null))
            .filter(Condition::eq("valid", true));
        let q = select(&s);
        assert_eq!(
            q.sql,
            "SELECT * FROM \"user\" WHERE \"phone\" IS NULL AND \"email\" IS NOT NULL AND \"valid\" = $1"
        );
        assert_eq!(q.params, vec![SqlValue::Bool(true)]);
    }
}
