//! Table registry: declarations validated and indexed once at startup, read-only afterwards.

use crate::config::{validate, StoreKind, TableDecl};
use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct TableRegistry {
    tables: Vec<TableDecl>,
    by_name: HashMap<&'static str, usize>,
}

impl TableRegistry {
    /// Validate declarations and build the registry.
    pub fn build(tables: Vec<TableDecl>) -> Result<Self, ConfigError> {
        validate(&tables)?;
        let by_name = tables.iter().enumerate().map(|(i, t)| (t.name, i)).collect();
        Ok(TableRegistry { tables, by_name })
    }

    pub fn get(&self, table: &str) -> Option<&TableDecl> {
        self.by_name.get(table).map(|&i| &self.tables[i])
    }

    /// Backend owning a table. Undeclared tables belong to the row store.
    pub fn store_of(&self, table: &str) -> StoreKind {
        self.get(table).map(|t| t.store).unwrap_or(StoreKind::Row)
    }

    pub fn is_analytical(&self, table: &str) -> bool {
        self.store_of(table) == StoreKind::Analytical
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDecl> {
        self.tables.iter()
    }

    /// Row-store tables open to the generic CRUD endpoints, as name -> declared columns.
    pub fn legal_targets(&self) -> Value {
        let mut map = Map::new();
        for t in self.tables.iter().filter(|t| t.store == StoreKind::Row) {
            map.insert(t.name.to_string(), t.columns_json());
        }
        Value::Object(map)
    }
}
