//! Service configuration
//!
//! Values are layered: built-in defaults, then an optional `catalog.toml` in
//! the working directory, then `CATALOG_*` environment variables.

use anyhow::{Result, bail};
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use std::path::PathBuf;

/// Deployment mode, drives log format and verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    Development,
    Production,
}

/// Catalog service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: RuntimeEnvironment,
    pub host: String,
    pub port: u16,
    /// Shared HMAC secret for signing access tokens
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 1 hour)
    pub jwt_expiry_seconds: u64,
    /// Directory where uploaded product images are written
    pub upload_dir: PathBuf,
    pub max_image_bytes: u64,
    pub page_size: u32,
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub login_ban_seconds: u64,
    /// Administrator ensured at startup when both are set
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Comma-separated browser origins allowed by CORS; unset allows any origin
    pub cors_origins: Option<String>,
}

impl AppConfig {
    /// Load the configuration from `catalog.toml` and the environment
    ///
    /// # Environment Variables
    /// - `CATALOG_JWT_SECRET`: token signing secret (required)
    /// - `CATALOG_PORT`, `CATALOG_HOST`: listen address (default: 0.0.0.0:5000)
    /// - `CATALOG_ENVIRONMENT`: `development` or `production`
    /// - `CATALOG_ADMIN_USERNAME` / `CATALOG_ADMIN_PASSWORD`: bootstrap admin
    /// - `CATALOG_CORS_ORIGINS`: e.g. `https://shop.example,https://admin.example`
    pub fn load() -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::with_name("catalog").required(false))
            .add_source(Environment::with_prefix("CATALOG").try_parsing(true));

        Self::from_builder(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000)?
            .set_default("jwt_expiry_seconds", 3600)?
            .set_default("upload_dir", "uploads")?
            .set_default("max_image_bytes", 5 * 1024 * 1024)?
            .set_default("page_size", 10)?
            .set_default("login_max_attempts", 5)?
            .set_default("login_window_seconds", 300)?
            .set_default("login_ban_seconds", 900)?;

        Ok(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: AppConfig = builder.build()?.try_deserialize()?;

        if config.jwt_secret.trim().is_empty() {
            bail!("CATALOG_JWT_SECRET must not be empty");
        }
        if config.page_size == 0 {
            bail!("page_size must be at least 1");
        }

        Ok(config)
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == RuntimeEnvironment::Production
    }

    /// Origins listed in `cors_origins`; empty means any origin
    pub fn allowed_origins(&self) -> Vec<&str> {
        self.cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    /// Bootstrap administrator credentials, if fully configured
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username.as_str(), password.as_str()))
            }
            _ => None,
        }
    }
}
