//! Caller identity. The transport resolves a caller id; this seam turns it into a role.

use crate::config::ID_COLUMN;
use crate::error::AppError;
use crate::models::user;
use crate::sql::{Condition, Select};
use crate::store::{Executor, WorkUnit};
use async_trait::async_trait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub role: String,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// None for anonymous or unknown callers.
    async fn resolve(
        &self,
        caller: Option<&str>,
        executor: &Executor,
        unit: &mut dyn WorkUnit,
    ) -> Result<Option<Identity>, AppError>;
}

/// Looks the caller up in the `user` table; disabled accounts resolve to nobody.
pub struct UserLookup;

#[async_trait]
impl IdentityResolver for UserLookup {
    async fn resolve(
        &self,
        caller: Option<&str>,
        executor: &Executor,
        unit: &mut dyn WorkUnit,
    ) -> Result<Option<Identity>, AppError> {
        let Some(caller) = caller else {
            return Ok(None);
        };
        let select = Select::from(user::TABLE)
            .columns([ID_COLUMN, "role"])
            .filter(Condition::eq(ID_COLUMN, caller))
            .filter(Condition::eq("valid", true));
        let row = executor.fetch_one(select, Some(unit)).await?;
        Ok(row.map(|r| Identity {
            id: caller.to_string(),
            role: r.get_str("role").unwrap_or_default().to_string(),
        }))
    }
}
