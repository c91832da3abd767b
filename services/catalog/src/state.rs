//! Application state shared across handlers

use sqlx::PgPool;
use std::{sync::Arc, time::Duration};

use crate::{
    config::AppConfig,
    jwt::{JwtConfig, JwtService},
    rate_limiter::{LoginThrottle, ThrottlePolicy},
    repositories::{ProductRepository, ReviewRepository, UserRepository},
    storage::LocalImageStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Present when running against PostgreSQL; used by the health check
    pub db_pool: Option<PgPool>,
    pub products: Arc<dyn ProductRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub users: Arc<dyn UserRepository>,
    pub jwt_service: JwtService,
    pub login_throttle: LoginThrottle,
    pub images: LocalImageStore,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db_pool: Option<PgPool>,
        products: Arc<dyn ProductRepository>,
        reviews: Arc<dyn ReviewRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        let jwt_service = JwtService::new(JwtConfig {
            secret: config.jwt_secret.clone(),
            expiry_seconds: config.jwt_expiry_seconds,
        });
        let login_throttle = LoginThrottle::new(ThrottlePolicy {
            max_failures: config.login_max_attempts,
            window: Duration::from_secs(config.login_window_seconds),
            lockout: Duration::from_secs(config.login_ban_seconds),
        });
        let images = LocalImageStore::new(config.upload_dir.clone(), config.max_image_bytes);

        Self {
            config: Arc::new(config),
            db_pool,
            products,
            reviews,
            users,
            jwt_service,
            login_throttle,
            images,
        }
    }
}
