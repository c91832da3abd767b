//! Infrastructure errors shared by the services

use sqlx::migrate::MigrateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The pool could not open a connection
    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// Schema migrations failed to apply
    #[error("Database migration error: {0}")]
    Migration(#[from] MigrateError),

    /// `DATABASE_*` settings are missing or inconsistent
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
