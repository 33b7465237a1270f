//! crudkit server: settings from the environment, both stores, DDL bootstrap, then serve.

use crudkit::{
    apply_migrations, app, models, pipeline::UserLookup, AppState, ClickHouseClient, Executor, PgRowStore, Settings,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudkit=info,access_log=info")),
        )
        .init();

    let registry = Arc::new(models::registry()?);
    let row_store = PgRowStore::connect(&settings.oltp_url, settings.oltp_max_connections).await?;
    let analytical = ClickHouseClient::new(&settings)?;
    let executor = Arc::new(Executor::new(registry, Arc::new(row_store), Arc::new(analytical)));
    apply_migrations(&executor).await?;

    let state = AppState::new(executor.clone(), Arc::new(UserLookup));
    let router = app(state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("crudkit listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
    executor.close().await;
    Ok(())
}
