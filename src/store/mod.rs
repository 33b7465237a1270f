//! Dual-store execution: transactional row store and append-only analytical store.

pub mod analytical;
pub mod executor;
pub mod row;
pub mod row_store;

pub use analytical::{AnalyticalClient, ClickHouseClient};
pub use executor::{analytical_id, row_id, ExecFlags, Executor, Outcome};
pub use row::Row;
pub use row_store::{PgRowStore, RowStore, WorkUnit};
