//! Common library for the catalog workspace
//!
//! This crate provides infrastructure shared by the services: PostgreSQL
//! configuration, pooling and health checks, plus the associated error types.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
