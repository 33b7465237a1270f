//! crudkit: schema-driven CRUD backend over a transactional row store and an append-only
//! analytical store.

pub mod apis;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod logging;
pub mod migration;
pub mod models;
pub mod pipeline;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{Settings, TableDecl, TableRegistry};
pub use error::{AppError, ConfigError, ExecFailure, RespCode};
pub use migration::apply_migrations;
pub use pipeline::{Call, Endpoint, Handler, HandlerContext, Pipeline};
pub use response::{ApiResponse, Reply};
pub use routes::app;
pub use service::CrudService;
pub use state::AppState;
pub use store::{ClickHouseClient, Executor, PgRowStore};
