//! `api_request_logs` table: one append-only row per handled request.

use crate::config::{ColumnDecl, ColumnType, StoreKind, TableDecl};
use crate::schema::EnumDef;
use serde_json::json;

pub const TABLE: &str = "api_request_logs";

pub fn table() -> TableDecl {
    TableDecl::new(
        TABLE,
        StoreKind::Analytical,
        vec![
            ColumnDecl::new("id", ColumnType::Text),
            ColumnDecl::nullable("user_id", ColumnType::Text),
            ColumnDecl::new("created_at", ColumnType::DateTime),
            ColumnDecl::new("method", ColumnType::Text),
            ColumnDecl::new("blueprint", ColumnType::Text),
            ColumnDecl::new("uri", ColumnType::Text),
            ColumnDecl::new("status", ColumnType::Int),
            ColumnDecl::new("duration", ColumnType::Int),
            ColumnDecl::new("source_ip", ColumnType::Text),
        ],
    )
}

pub fn method_enum() -> EnumDef {
    EnumDef::new(
        "Method",
        ["GET", "POST", "PUT", "PATCH", "DELETE"]
            .into_iter()
            .map(|m| (m, json!(m)))
            .collect(),
    )
}
