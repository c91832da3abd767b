use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod jwt;
mod middleware;
mod models;
mod rate_limiter;
mod ratings;
mod repositories;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod testing;
mod validation;

use common::{
    database::{DatabaseConfig, health_check, init_pool},
    error::DatabaseError,
};
use tokio::net::TcpListener;

use crate::{
    config::AppConfig,
    repositories::{PgProductRepository, PgReviewRepository, PgUserRepository, UserRepository},
    state::AppState,
};

/// Human-readable logs in development, JSON lines in production
fn init_tracing(config: &AppConfig) -> Result<()> {
    let default_level = if config.is_production() { "info" } else { "debug" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let initialised = if config.is_production() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    initialised.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config)?;

    info!("Starting catalog service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(DatabaseError::from)?;
    info!("Database migrations applied");

    // Initialize repositories
    let users = Arc::new(PgUserRepository::new(pool.clone()));
    match config.bootstrap_admin() {
        Some((username, password)) => {
            users.ensure_admin(username, password).await?;
        }
        None => warn!("No bootstrap administrator configured"),
    }

    let app_state = AppState::new(
        config,
        Some(pool.clone()),
        Arc::new(PgProductRepository::new(pool.clone())),
        Arc::new(PgReviewRepository::new(pool)),
        users,
    );
    app_state.images.ensure_dir().await?;

    let bind_address = app_state.config.bind_address();

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&bind_address).await?;
    info!("Catalog service listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
