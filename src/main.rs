use anyhow::{Context, Result};

use copany::config::ServerConfig;
use copany::db_utils::Database;
use copany::server::{build_router, AppState};
use copany::sqlite_store::SqliteDocumentStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load().context("failed to load config")?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let db = Database::open(&config.database_path, config.busy_timeout()).with_context(|| {
        format!("failed to open database {}", config.database_path.display())
    })?;
    let state = AppState::new(SqliteDocumentStore::new(db));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    log::info!(
        "Listening on http://{} (database {})",
        config.bind,
        config.database_path.display()
    );

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
