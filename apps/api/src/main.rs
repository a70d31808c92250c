//! Server binary: config, logging, database, router, serve.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tienda_api::{build_router, ApiConfig, AppState, StaticAuthProvider};
use tienda_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::load().context("loading configuration")?;
    info!(bind_addr = %config.bind_addr, database = %config.database_path, "Starting tienda-api");

    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.max_connections),
    )
    .await
    .context("opening database")?;

    let auth = StaticAuthProvider::from_tokens(&config.tokens);
    let router = build_router(AppState::new(db, auth));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("Listening");
    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
