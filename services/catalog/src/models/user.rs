//! User model and related functionality

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role granted to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(anyhow::anyhow!("Unknown role: {}", other)),
        }
    }
}

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub role: Role,
}

/// New user creation payload; the password is hashed by the repository
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Request for user login
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Response for user login
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
