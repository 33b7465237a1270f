//! Query services: filter parsing, pagination, generic CRUD.

pub mod crud;
pub mod filter;
pub mod paginate;

pub use crud::CrudService;
pub use filter::{parse_filters, FilterOp, FilterSpec};
pub use paginate::{contains_pattern, paginate, safe_column, safe_columns, Page, PageRequest};
