//! In-memory fakes for the store seams.
//!
//! The row store keeps committed tables and evaluates the statement model against them. Each unit
//! works on a snapshot taken at its first statement and replays its writes on commit, so units
//! are isolated from each other's uncommitted work. Statements whose SQL contains a scripted
//! needle get the scripted answer instead. A journal records everything sent, everything
//! committed, and unit lifecycle counts.

#![allow(dead_code)]

mod eval;

use async_trait::async_trait;
use crudkit::config::TableRegistry;
use crudkit::error::ExecFailure;
use crudkit::pipeline::{Identity, IdentityResolver};
use crudkit::sql::{render, QueryBuf, Statement};
use crudkit::store::{AnalyticalClient, Executor, Row, RowStore, WorkUnit};
use crudkit::{models, AppError};
use eval::{Applied, Tables};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
pub enum Scripted {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(ExecFailure),
}

#[derive(Debug, Default)]
pub struct Journal {
    pub executed: Vec<QueryBuf>,
    pub committed: Vec<QueryBuf>,
    pub begins: usize,
    pub rollbacks: usize,
    pub closes: usize,
}

#[derive(Default)]
struct Shared {
    script: Vec<(String, Scripted)>,
    journal: Journal,
    fail_commit: bool,
    tables: Tables,
}

#[derive(Clone, Default)]
pub struct MemoryRowStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        MemoryRowStore::default()
    }

    /// Answer any statement whose SQL contains `needle`. Earlier scripts win.
    pub fn on(&self, needle: &str, reply: Scripted) -> &Self {
        self.shared.lock().unwrap().script.push((needle.to_string(), reply));
        self
    }

    /// Add committed rows to a table.
    pub fn seed(&self, table: &str, rows: Vec<Row>) -> &Self {
        self.shared
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        self
    }

    /// Committed contents of a table.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.shared.lock().unwrap().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn fail_commit(&self) {
        self.shared.lock().unwrap().fail_commit = true;
    }

    pub fn journal<T>(&self, f: impl FnOnce(&Journal) -> T) -> T {
        f(&self.shared.lock().unwrap().journal)
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.journal(|j| j.executed.iter().map(|q| q.sql.clone()).collect())
    }

    pub fn committed_sql(&self) -> Vec<String> {
        self.journal(|j| j.committed.iter().map(|q| q.sql.clone()).collect())
    }

    fn answer(&self, q: &QueryBuf) -> Option<Scripted> {
        let mut shared = self.shared.lock().unwrap();
        shared.journal.executed.push(q.clone());
        shared
            .script
            .iter()
            .find(|(needle, _)| q.sql.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
    }

    fn snapshot(&self) -> Tables {
        self.shared.lock().unwrap().tables.clone()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn begin(&self) -> Result<Box<dyn WorkUnit>, ExecFailure> {
        self.shared.lock().unwrap().journal.begins += 1;
        Ok(Box::new(MemoryUnit {
            store: self.clone(),
            working: None,
            pending: Vec::new(),
            writes: Vec::new(),
            rolled_back: false,
        }))
    }

    async fn ping(&self) -> Result<(), ExecFailure> {
        Ok(())
    }
}

pub struct MemoryUnit {
    store: MemoryRowStore,
    /// Snapshot plus this unit's own writes; taken lazily like a transaction.
    working: Option<Tables>,
    pending: Vec<QueryBuf>,
    /// Evaluated writes, replayed on the shared tables at commit.
    writes: Vec<Statement>,
    rolled_back: bool,
}

impl MemoryUnit {
    fn run(&mut self, stmt: &Statement) -> Result<Applied, ExecFailure> {
        let q = render(stmt);
        self.pending.push(q.clone());
        match self.store.answer(&q) {
            Some(Scripted::Rows(rows)) => Ok(Applied::Rows(rows)),
            Some(Scripted::Affected(n)) => Ok(Applied::Affected(n)),
            Some(Scripted::Fail(e)) => Err(e),
            None => {
                let store = &self.store;
                let working = self.working.get_or_insert_with(|| store.snapshot());
                let applied = eval::run(working, stmt)?;
                if !stmt.is_select() {
                    self.writes.push(stmt.clone());
                }
                Ok(applied)
            }
        }
    }
}

#[async_trait]
impl WorkUnit for MemoryUnit {
    async fn fetch(&mut self, stmt: &Statement) -> Result<Vec<Row>, ExecFailure> {
        match self.run(stmt)? {
            Applied::Rows(rows) => Ok(rows),
            Applied::Affected(_) => Ok(Vec::new()),
        }
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, ExecFailure> {
        match self.run(stmt)? {
            Applied::Affected(n) => Ok(n),
            Applied::Rows(rows) => Ok(rows.len() as u64),
        }
    }

    async fn execute_ddl(&mut self, ddl: &str) -> Result<(), ExecFailure> {
        self.pending.push(QueryBuf {
            sql: ddl.to_string(),
            params: Vec::new(),
        });
        Ok(())
    }

    async fn rollback(&mut self) {
        self.rolled_back = true;
        self.pending.clear();
        self.writes.clear();
        self.working = None;
        self.store.shared.lock().unwrap().journal.rollbacks += 1;
    }

    fn rolled_back(&self) -> bool {
        self.rolled_back
    }

    async fn close(self: Box<Self>) -> Result<(), ExecFailure> {
        let MemoryUnit {
            store,
            pending,
            writes,
            rolled_back,
            ..
        } = *self;
        let mut shared = store.shared.lock().unwrap();
        shared.journal.closes += 1;
        if rolled_back {
            return Ok(());
        }
        if shared.fail_commit {
            return Err(ExecFailure::driver("connection reset during commit"));
        }
        for stmt in &writes {
            eval::run(&mut shared.tables, stmt)?;
        }
        shared.journal.committed.extend(pending);
        Ok(())
    }
}

/// Analytical fake: records every statement, answers reads by SQL substring.
#[derive(Clone, Default)]
pub struct RecordingAnalytical {
    script: Arc<Mutex<Vec<(String, Vec<Row>)>>>,
    pub queries: Arc<Mutex<Vec<String>>>,
    pub writes: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl RecordingAnalytical {
    pub fn new() -> Self {
        RecordingAnalytical::default()
    }

    pub fn on(&self, needle: &str, rows: Vec<Row>) -> &Self {
        self.script.lock().unwrap().push((needle.to_string(), rows));
        self
    }

    pub fn query_log(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn write_log(&self) -> Vec<(String, Option<String>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticalClient for RecordingAnalytical {
    async fn query(&self, sql: &str) -> Result<Vec<Row>, ExecFailure> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(self
            .script
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn execute(&self, sql: &str, body: Option<String>) -> Result<(), ExecFailure> {
        self.writes.lock().unwrap().push((sql.to_string(), body));
        Ok(())
    }
}

/// Resolves every call to the same identity.
pub struct FixedIdentity(pub Option<Identity>);

#[async_trait]
impl IdentityResolver for FixedIdentity {
    async fn resolve(
        &self,
        _caller: Option<&str>,
        _executor: &Executor,
        _unit: &mut dyn WorkUnit,
    ) -> Result<Option<Identity>, AppError> {
        Ok(self.0.clone())
    }
}

pub fn admin() -> Identity {
    Identity {
        id: "a1b2c3d4e5f60718".into(),
        role: models::user::ROLE_ADMIN.into(),
    }
}

pub fn member() -> Identity {
    Identity {
        id: "0f1e2d3c4b5a6978".into(),
        role: models::user::ROLE_USER.into(),
    }
}

pub fn registry() -> Arc<TableRegistry> {
    Arc::new(models::registry().unwrap())
}

pub fn executor(row: &MemoryRowStore, analytical: &RecordingAnalytical) -> Arc<Executor> {
    Arc::new(Executor::new(
        registry(),
        Arc::new(row.clone()),
        Arc::new(analytical.clone()),
    ))
}

/// Row from a JSON object literal.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => Row::from_object(map),
        other => panic!("row expects an object, got {}", other),
    }
}

/// One-cell row as returned by a count query.
pub fn count_row(total: u64) -> Row {
    Row::new(vec!["total".into()], vec![Value::from(total)])
}
