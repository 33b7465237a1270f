//! Statement model: one logical SQL statement, independent of which backend runs it.
//! Identifiers are always declared names; values never reach SQL text except through a renderer.

use crate::sql::SqlValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn keyword(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

/// Closed comparison operator set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// `IS NULL` / `IS NOT NULL` for equality against null, which `=` would never match.
pub fn null_test(op: CompareOp, value: &SqlValue) -> Option<&'static str> {
    match (op, value.is_null()) {
        (CompareOp::Eq, true) => Some("IS NULL"),
        (CompareOp::Ne, true) => Some("IS NOT NULL"),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Compare {
        column: String,
        op: CompareOp,
        value: SqlValue,
    },
    Like {
        column: String,
        pattern: String,
    },
    In {
        column: String,
        values: Vec<SqlValue>,
        negated: bool,
    },
    /// Inclusive range; a missing bound is open.
    Range {
        column: String,
        lo: Option<SqlValue>,
        hi: Option<SqlValue>,
    },
    /// Disjunction of the inner conditions.
    AnyOf(Vec<Condition>),
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Condition::Compare {
            column: column.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<SqlValue>) -> Self {
        Condition::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::Like {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_in(column: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Condition::In {
            column: column.into(),
            values,
            negated: false,
        }
    }

    pub fn not_in(column: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Condition::In {
            column: column.into(),
            values,
            negated: true,
        }
    }

    pub fn range(column: impl Into<String>, lo: Option<SqlValue>, hi: Option<SqlValue>) -> Self {
        Condition::Range {
            column: column.into(),
            lo,
            hi,
        }
    }

    /// Columns referenced by this condition, including nested disjunctions.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Condition::Compare { column, .. }
            | Condition::Like { column, .. }
            | Condition::In { column, .. }
            | Condition::Range { column, .. } => vec![column.as_str()],
            Condition::AnyOf(inner) => inner.iter().flat_map(|c| c.columns()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Columns(Vec<String>),
    Count,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub table: String,
    pub projection: Projection,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Select {
            table: table.into(),
            projection: Projection::Columns(Vec::new()),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Projection::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Count of rows matching the same filters, without ordering or pagination.
    pub fn count(&self) -> Select {
        Select {
            table: self.table.clone(),
            projection: Projection::Count,
            conditions: self.conditions.clone(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn projected_columns(&self) -> &[String] {
        match &self.projection {
            Projection::Columns(c) => c,
            Projection::Count => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl Insert {
    pub fn into_table(table: impl Into<String>) -> Self {
        Insert {
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Single-row insert from (column, value) pairs.
    pub fn values<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, SqlValue)>,
        S: Into<String>,
    {
        let (columns, row): (Vec<String>, Vec<SqlValue>) =
            pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        self.columns = columns;
        self.rows = vec![row];
        self
    }

    /// Batch insert: shared column list, one value vector per row.
    pub fn rows(mut self, columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    pub fn is_batch(&self) -> bool {
        self.rows.len() > 1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, SqlValue)>,
    pub conditions: Vec<Condition>,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Update {
            table: table.into(),
            assignments: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Delete {
    pub table: String,
    pub conditions: Vec<Condition>,
}

impl Delete {
    pub fn from(table: impl Into<String>) -> Self {
        Delete {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    /// Target table; drives backend selection.
    pub fn table(&self) -> &str {
        match self {
            Statement::Select(s) => &s.table,
            Statement::Insert(i) => &i.table,
            Statement::Update(u) => &u.table,
            Statement::Delete(d) => &d.table,
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, Statement::Select(_))
    }
}

impl From<Select> for Statement {
    fn from(s: Select) -> Self {
        Statement::Select(s)
    }
}

impl From<Insert> for Statement {
    fn from(i: Insert) -> Self {
        Statement::Insert(i)
    }
}

impl From<Update> for Statement {
    fn from(u: Update) -> Self {
        Statement::Update(u)
    }
}

impl From<Delete> for Statement {
    fn from(d: Delete) -> Self {
        Statement::Delete(d)
    }
}
