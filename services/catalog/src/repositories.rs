//! Repositories for database operations
//!
//! Each table is accessed through a trait so handlers can be driven by either
//! the PostgreSQL implementations or the in-memory ones used in tests.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{
    product::{NewProduct, Product, ProductChanges, ProductWithRating},
    review::{NewReview, Review, ReviewFilter},
    user::{NewUser, Role, User},
};

pub mod product;
pub mod review;
pub mod user;

pub use product::PgProductRepository;
pub use review::PgReviewRepository;
pub use user::PgUserRepository;

/// Product persistence
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// One page of products ordered by id, with the total product count
    async fn list(&self, page: u32, page_size: u32) -> Result<(Vec<ProductWithRating>, i64)>;

    async fn find(&self, id: i32) -> Result<Option<ProductWithRating>>;

    async fn exists(&self, id: i32) -> Result<bool>;

    async fn create(&self, product: &NewProduct) -> Result<Product>;

    /// Apply a partial update; `None` when the product does not exist
    async fn update(&self, id: i32, changes: &ProductChanges) -> Result<Option<Product>>;

    /// Delete a product and its reviews; `false` when it did not exist
    async fn delete(&self, id: i32) -> Result<bool>;
}

/// A new review pointed at a row that does not exist
///
/// Returned inside the `anyhow::Error` of [`ReviewRepository::create`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MissingReference {
    #[error("referenced product does not exist")]
    Product,
    #[error("referenced user does not exist")]
    User,
}

/// Review persistence
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Reviews of a product matching the filter, in the filter's order
    async fn list_for_product(&self, product_id: i32, filter: &ReviewFilter) -> Result<Vec<Review>>;

    /// Grouped `(rating, count)` rows for a product
    async fn rating_counts(&self, product_id: i32) -> Result<Vec<(i32, i64)>>;

    /// Insert a review; fails with [`MissingReference`] for an unknown product or author
    async fn create(&self, review: &NewReview) -> Result<Review>;
}

/// User persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Create a user, hashing the supplied password
    async fn create(&self, user: &NewUser) -> Result<User>;

    /// Make sure an administrator with this username exists
    async fn ensure_admin(&self, username: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.find_by_username(username).await? {
            if existing.role != Role::Admin {
                warn!(
                    "Bootstrap admin {} already exists with role {}",
                    existing.username, existing.role
                );
            }
            return Ok(existing);
        }

        info!("Creating bootstrap administrator {}", username);
        self.create(&NewUser {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Admin,
        })
        .await
    }
}
