//! Custom error types for the catalog service

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::jwt::AuthFailure;

pub const IMAGE_TOO_LARGE: &str = "L'image ne doit pas dépasser 5 Mo";

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            message: message.to_string(),
        }
    }

    /// Failure not tied to a particular field
    pub fn general(message: &str) -> Self {
        Self {
            field: None,
            message: message.to_string(),
        }
    }
}

/// Custom error type for the catalog service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, malformed, expired or invalid credentials
    #[error("Unauthenticated: {0}")]
    Unauthenticated(AuthFailure),

    /// Authenticated but lacking the required role
    #[error("Forbidden")]
    Forbidden,

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// One or more fields failed validation
    #[error("Invalid input: {0:?}")]
    InvalidInput(Vec<FieldError>),

    /// Login attempts exhausted for this username
    #[error("Too many login attempts")]
    TooManyAttempts,

    /// Unexpected failure
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn product_not_found() -> Self {
        ApiError::NotFound("Produit non trouvé".to_string())
    }

    pub fn invalid(field: &str, message: &str) -> Self {
        ApiError::InvalidInput(vec![FieldError::new(field, message)])
    }

    /// Fail with the collected errors, if any
    pub fn check(errors: Vec<FieldError>) -> Result<(), ApiError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::InvalidInput(errors))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(errors) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response();
            }
            ApiError::Unauthenticated(failure) => (StatusCode::UNAUTHORIZED, failure.message().to_string()),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Accès refusé. Autorisation administrateur requise.".to_string(),
            ),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::TooManyAttempts => (
                StatusCode::TOO_MANY_REQUESTS,
                "Trop de tentatives de connexion. Réessayez plus tard.".to_string(),
            ),
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Erreur de serveur".to_string())
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected JSON body: {}", rejection.body_text());
        ApiError::InvalidInput(vec![FieldError::general("Corps de requête JSON invalide")])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        warn!("Rejected query string: {}", rejection.body_text());
        ApiError::InvalidInput(vec![FieldError::general("Paramètres de requête invalides")])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        warn!("Rejected path parameter: {}", rejection.body_text());
        ApiError::invalid("id", "ID produit invalide")
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        warn!("Rejected multipart request: {}", rejection.body_text());
        ApiError::InvalidInput(vec![FieldError::general("Formulaire multipart invalide")])
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        warn!("Rejected multipart body: {}", e.body_text());
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::invalid("image", IMAGE_TOO_LARGE)
        } else {
            ApiError::invalid("image", "Erreur de traitement de fichier")
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
