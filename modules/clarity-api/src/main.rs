use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clarity_api::{router, AppState};
use clarity_common::Config;
use clarity_store::PgStore;

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("clarity=info".parse()?);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = Config::from_env();
    let addr = format!("{}:{}", config.api_host, config.api_port);

    if let Some(url) = config.database_url.as_deref() {
        if std::env::var("RUN_MIGRATIONS").is_ok_and(|v| v == "1" || v == "true") {
            let store = PgStore::connect_lazy(url)?;
            match store.migrate().await {
                Ok(()) => info!("Migrations applied"),
                Err(e) => warn!(error = %e, "Migrations failed"),
            }
        }
    }

    let state = Arc::new(AppState::from_config(config)?);
    let app = router(state);

    info!("Clarity API starting on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
