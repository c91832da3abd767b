//! JWT service for token generation and validation
//!
//! Tokens are signed with HS256 using a shared secret and carry the user
//! identifier and role. Validation distinguishes expired tokens from tokens
//! that are malformed or signed with another key.

use anyhow::Result;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::models::user::{Role, User};

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret used to sign and verify tokens
    pub secret: String,
    /// Token expiration time in seconds (default: 1 hour)
    pub expiry_seconds: u64,
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User ID
    pub user_id: i32,
    /// User role
    pub role: Role,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Why a credential was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization: Bearer <token>` header
    MissingToken,
    /// Signature valid but `exp` is in the past
    Expired,
    /// Bad signature, malformed token or unexpected claims
    InvalidToken,
    /// Unknown username or wrong password at login
    InvalidCredentials,
}

impl AuthFailure {
    /// Client-facing message
    pub fn message(self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Authentification requise. Veuillez vous connecter.",
            AuthFailure::Expired => "Session expirée. Veuillez vous reconnecter.",
            AuthFailure::InvalidToken => "Token invalide. Authentification requise.",
            AuthFailure::InvalidCredentials => "Identifiants invalides",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Identity extracted from a verified token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i32,
    pub role: Role,
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthFailure> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthFailure::MissingToken)
}

fn now_seconds() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs())
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp".to_string()].into_iter().collect();

        JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Generate an access token for a user
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = now_seconds()?;
        self.encode_claims(&Claims {
            user_id: user.id,
            role: user.role,
            iat: now,
            exp: now + self.config.expiry_seconds,
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token and return the identity it carries
    pub fn verify(&self, token: &str) -> Result<Identity, AuthFailure> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthFailure::Expired,
                _ => AuthFailure::InvalidToken,
            }
        })?;

        Ok(Identity {
            user_id: data.claims.user_id,
            role: data.claims.role,
        })
    }

    /// Validate the raw `Authorization` header value
    pub fn verify_header(&self, header: Option<&str>) -> Result<Identity, AuthFailure> {
        self.verify(bearer_token(header)?)
    }
}
