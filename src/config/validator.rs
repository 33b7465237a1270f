//! Declaration validation: unique names, id columns, dependent references.

use crate::config::{StoreKind, TableDecl, ID_COLUMN};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(tables: &[TableDecl]) -> Result<(), ConfigError> {
    let mut by_name: HashMap<&str, &TableDecl> = HashMap::new();
    for t in tables {
        if by_name.insert(t.name, t).is_some() {
            return Err(ConfigError::DuplicateTable(t.name.to_string()));
        }
        let mut seen = HashSet::new();
        for c in &t.columns {
            if !seen.insert(c.name) {
                return Err(ConfigError::DuplicateColumn {
                    table: t.name.to_string(),
                    column: c.name.to_string(),
                });
            }
        }
        if !t.has_column(ID_COLUMN) {
            return Err(ConfigError::MissingId(t.name.to_string()));
        }
        if let Some(col) = t.unique.iter().find(|c| !t.has_column(c)) {
            return Err(ConfigError::MissingReference {
                kind: "unique column",
                id: format!("{}.{}", t.name, col),
            });
        }
    }

    for t in tables {
        for dep in &t.dependents {
            let target = by_name
                .get(dep.table)
                .filter(|d| d.store == StoreKind::Row && t.store == StoreKind::Row)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "dependent table",
                    id: dep.table.to_string(),
                })?;
            if !target.has_column(dep.foreign_key) {
                return Err(ConfigError::MissingReference {
                    kind: "dependent column",
                    id: format!("{}.{}", dep.table, dep.foreign_key),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnDecl, ColumnType};

    fn with_id(name: &'static str, store: StoreKind) -> TableDecl {
        TableDecl::new(
            name,
            store,
            vec![
                ColumnDecl::new("id", ColumnType::Text),
                ColumnDecl::new("owner_id", ColumnType::Text),
            ],
        )
    }

    #[test]
    fn accepts_consistent_declarations() {
        let tables = vec![
            with_id("owner", StoreKind::Row).with_dependent("item", "owner_id"),
            with_id("item", StoreKind::Row),
            with_id("events", StoreKind::Analytical),
        ];
        validate(&tables).unwrap();
    }

    #[test]
    fn rejects_duplicate_tables_and_missing_ids() {
        let dup = vec![with_id("a", StoreKind::Row), with_id("a", StoreKind::Analytical)];
        assert!(matches!(validate(&dup), Err(ConfigError::DuplicateTable(_))));

        let no_id = vec![TableDecl::new(
            "b",
            StoreKind::Row,
            vec![ColumnDecl::new("name", ColumnType::Text)],
        )];
        assert!(matches!(validate(&no_id), Err(ConfigError::MissingId(_))));
    }

    #[test]
    fn dependents_must_live_in_the_row_store() {
        let tables = vec![
            with_id("owner", StoreKind::Row).with_dependent("events", "owner_id"),
            with_id("events", StoreKind::Analytical),
        ];
        assert!(matches!(
            validate(&tables),
            Err(ConfigError::MissingReference { kind: "dependent table", .. })
        ));
    }
}
