//! Bootstrap DDL for declared tables: PostgreSQL tables in the row store, MergeTree tables in the
//! analytical store. Every statement is `IF NOT EXISTS`, so startup can run it unconditionally.

use crate::config::{ColumnDecl, ColumnType, StoreKind, TableDecl, ID_COLUMN};
use crate::error::{AppError, ExecFailure};
use crate::sql::{literal, quoted};
use crate::store::{Executor, WorkUnit};

fn pg_type(t: ColumnType) -> &'static str {
    match t {
        ColumnType::Text => "TEXT",
        ColumnType::Int => "BIGINT",
        ColumnType::Float => "DOUBLE PRECISION",
        ColumnType::Bool => "BOOLEAN",
        ColumnType::DateTime => "TIMESTAMP",
        ColumnType::Json => "JSONB",
    }
}

fn ch_type(c: &ColumnDecl) -> String {
    let base = match c.type_ {
        ColumnType::Text | ColumnType::Json => "String",
        ColumnType::Int => "Int64",
        ColumnType::Float => "Float64",
        ColumnType::Bool => "Bool",
        ColumnType::DateTime => "DateTime",
    };
    if c.nullable {
        format!("Nullable({})", base)
    } else {
        base.to_string()
    }
}

/// CREATE TABLE for a row-store table: `id` primary key, NOT NULL unless declared nullable.
pub fn row_table_ddl(t: &TableDecl) -> String {
    let mut defs: Vec<String> = t
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quoted(c.name), pg_type(c.type_));
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();
    defs.push(format!("PRIMARY KEY ({})", quoted(ID_COLUMN)));
    for u in &t.unique {
        defs.push(format!("UNIQUE ({})", quoted(u)));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quoted(t.name),
        defs.join(",\n  ")
    )
}

/// CREATE TABLE for an analytical table, ordered by creation time when the table has one.
pub fn analytical_table_ddl(t: &TableDecl) -> String {
    let defs: Vec<String> = t
        .columns
        .iter()
        .map(|c| format!("{} {}", literal::ident(c.name), ch_type(c)))
        .collect();
    let order = if t.has_column("created_at") {
        format!("({}, {})", literal::ident("created_at"), literal::ident(ID_COLUMN))
    } else {
        literal::ident(ID_COLUMN)
    };
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n) ENGINE = MergeTree ORDER BY {}",
        literal::ident(t.name),
        defs.join(",\n  "),
        order
    )
}

/// Create every declared table in its owning store. Row-store DDL runs in one work unit.
pub async fn apply_migrations(executor: &Executor) -> Result<(), AppError> {
    let mut unit = executor.begin().await?;
    if let Err(e) = ensure_tables(executor, unit.as_mut()).await {
        unit.rollback().await;
        let _ = unit.close().await;
        return Err(e.into());
    }
    unit.close().await?;
    Ok(())
}

async fn ensure_tables(executor: &Executor, unit: &mut dyn WorkUnit) -> Result<(), ExecFailure> {
    for t in executor.registry().tables() {
        match t.store {
            StoreKind::Row => {
                unit.execute_ddl(&row_table_ddl(t)).await?;
            }
            StoreKind::Analytical => {
                executor
                    .analytical()
                    .execute(&analytical_table_ddl(t), None)
                    .await?;
            }
        }
        tracing::info!(table = %t.name, store = ?t.store, "table ensured");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{request_log, user};

    #[test]
    fn user_table_has_key_and_unique_account() {
        let ddl = row_table_ddl(&user::table());
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"user\""));
        assert!(ddl.contains("\"valid\" BOOLEAN NOT NULL"));
        assert!(ddl.contains("\"email\" TEXT,"));
        assert!(ddl.contains("PRIMARY KEY (\"id\")"));
        assert!(ddl.contains("UNIQUE (\"account\")"));
    }

    #[test]
    fn log_table_is_merge_tree_by_time() {
        let ddl = analytical_table_ddl(&request_log::table());
        assert!(ddl.contains("`user_id` Nullable(String)"));
        assert!(ddl.contains("`status` Int64"));
        assert!(ddl.ends_with("ENGINE = MergeTree ORDER BY (`created_at`, `id`)"));
    }
}
