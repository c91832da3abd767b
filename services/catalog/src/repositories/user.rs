//! User repository for database operations

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::OnceLock;
use tracing::{error, info};

use super::UserRepository;
use crate::models::user::{NewUser, User};

/// Hash a password into an argon2 PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(hash)
}

fn verify_hash(password_hash: &str, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Verify a user's password
pub fn verify_password(user: &User, password: &str) -> Result<bool> {
    verify_hash(&user.password_hash, password)
}

/// Hash checked when the username is unknown, so both paths cost one argon2 run
fn dummy_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    DUMMY_HASH
        .get_or_init(|| match hash_password("catalog-unknown-user") {
            Ok(hash) => Some(hash),
            Err(e) => {
                error!("Failed to prepare dummy password hash: {:#}", e);
                None
            }
        })
        .as_deref()
}

/// Check a login's credentials; `false` for unknown users and wrong passwords
pub fn check_credentials(user: Option<&User>, password: &str) -> Result<bool> {
    match user {
        Some(user) => verify_password(user, password),
        None => {
            if let Some(hash) = dummy_hash() {
                verify_hash(hash, password)?;
            }
            Ok(false)
        }
    }
}

/// User repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role: role.parse()?,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, role
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn create(&self, user: &NewUser) -> Result<User> {
        info!("Creating new user: {}", user.username);

        let password_hash = hash_password(&user.password)?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, role
            "#,
        )
        .bind(&user.username)
        .bind(&password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        user_from_row(&row)
    }
}
