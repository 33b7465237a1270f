//! Declared entities.

pub mod request_log;
pub mod user;

use crate::config::{TableDecl, TableRegistry};
use crate::error::ConfigError;

/// Every table the service owns.
pub fn tables() -> Vec<TableDecl> {
    vec![user::table(), request_log::table()]
}

pub fn registry() -> Result<TableRegistry, ConfigError> {
    TableRegistry::build(tables())
}
