//! In-memory repositories and fixtures for handler tests

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    config::{AppConfig, RuntimeEnvironment},
    models::{
        product::{NewProduct, Product, ProductChanges, ProductWithRating},
        review::{NewReview, Review, ReviewFilter},
        user::{NewUser, Role, User},
    },
    ratings::average_rating,
    repositories::{
        MissingReference, ProductRepository, ReviewRepository, UserRepository,
        user::hash_password,
    },
    state::AppState,
};

pub const TEST_SECRET: &str = "test-secret";

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    reviews: Vec<Review>,
    users: Vec<User>,
    next_product_id: i32,
    next_review_id: i32,
    next_user_id: i32,
}

impl Tables {
    fn with_rating(&self, product: &Product) -> ProductWithRating {
        let ratings: Vec<i32> = self
            .reviews
            .iter()
            .filter(|r| r.product_id == product.id)
            .map(|r| r.rating)
            .collect();

        ProductWithRating {
            product: product.clone(),
            average_rating: average_rating(&ratings),
        }
    }
}

/// One shared in-memory store implementing every repository trait
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    tables: Arc<Mutex<Tables>>,
    failing_writes: Arc<AtomicBool>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a product directly
    pub async fn seed_product(&self, title: &str) -> Product {
        ProductRepository::create(
            self,
            &NewProduct {
                title: title.to_string(),
                description: format!("{title} description"),
                price: rust_decimal::Decimal::new(1999, 2),
                image_url: format!("/uploads/{title}.png"),
            },
        )
        .await
        .unwrap()
    }

    /// Insert a review with an explicit timestamp
    pub async fn seed_review(
        &self,
        product_id: i32,
        rating: i32,
        comment: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Review {
        let mut tables = self.tables.lock().await;
        tables.next_review_id += 1;
        let review = Review {
            id: tables.next_review_id,
            product_id,
            user_id: 1,
            rating,
            comment: comment.map(str::to_string),
            created_at,
        };
        tables.reviews.push(review.clone());
        review
    }

    /// Make every later product write fail as if the database were down
    pub fn fail_product_writes(&self) {
        self.failing_writes.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing_writes.load(Ordering::SeqCst) {
            bail!("database unavailable");
        }
        Ok(())
    }

    pub async fn product_count(&self) -> usize {
        self.tables.lock().await.products.len()
    }

    pub async fn review_count(&self) -> usize {
        self.tables.lock().await.reviews.len()
    }

    pub async fn review_author(&self, review_id: i32) -> Option<i32> {
        let tables = self.tables.lock().await;
        tables
            .reviews
            .iter()
            .find(|r| r.id == review_id)
            .map(|r| r.user_id)
    }
}

#[async_trait]
impl ProductRepository for InMemoryCatalog {
    async fn list(&self, page: u32, page_size: u32) -> Result<(Vec<ProductWithRating>, i64)> {
        let tables = self.tables.lock().await;
        let skip = page.saturating_sub(1) as usize * page_size as usize;

        let data = tables
            .products
            .iter()
            .skip(skip)
            .take(page_size as usize)
            .map(|p| tables.with_rating(p))
            .collect();

        Ok((data, tables.products.len() as i64))
    }

    async fn find(&self, id: i32) -> Result<Option<ProductWithRating>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.with_rating(p)))
    }

    async fn exists(&self, id: i32) -> Result<bool> {
        Ok(self.tables.lock().await.products.iter().any(|p| p.id == id))
    }

    async fn create(&self, product: &NewProduct) -> Result<Product> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        tables.next_product_id += 1;
        let created = Product {
            id: tables.next_product_id,
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
        };
        tables.products.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, changes: &ProductChanges) -> Result<Option<Product>> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        Ok(tables.products.iter_mut().find(|p| p.id == id).map(|p| {
            changes.apply_to(p);
            p.clone()
        }))
    }

    async fn delete(&self, id: i32) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        let deleted = tables.products.len() < before;
        if deleted {
            tables.reviews.retain(|r| r.product_id != id);
        }
        Ok(deleted)
    }
}

#[async_trait]
impl ReviewRepository for InMemoryCatalog {
    async fn list_for_product(&self, product_id: i32, filter: &ReviewFilter) -> Result<Vec<Review>> {
        let tables = self.tables.lock().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id && filter.matches(r))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| filter.sort.compare(a, b));
        Ok(reviews)
    }

    async fn rating_counts(&self, product_id: i32) -> Result<Vec<(i32, i64)>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| (r.rating, 1))
            .collect())
    }

    async fn create(&self, review: &NewReview) -> Result<Review> {
        let mut tables = self.tables.lock().await;
        if !tables.products.iter().any(|p| p.id == review.product_id) {
            return Err(MissingReference::Product.into());
        }
        if !tables.users.iter().any(|u| u.id == review.user_id) {
            return Err(MissingReference::User.into());
        }
        tables.next_review_id += 1;
        let created = Review {
            id: tables.next_review_id,
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
        };
        tables.reviews.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl UserRepository for InMemoryCatalog {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: &NewUser) -> Result<User> {
        let password_hash = hash_password(&user.password)?;
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            bail!("duplicate username {}", user.username);
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username.clone(),
            password_hash,
            role: user.role,
        };
        tables.users.push(created.clone());
        Ok(created)
    }
}

/// Configuration suitable for tests, writing images to a fresh temp directory
pub fn test_config() -> AppConfig {
    AppConfig {
        environment: RuntimeEnvironment::Development,
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiry_seconds: 3600,
        upload_dir: std::env::temp_dir().join(format!("catalog-test-{}", Uuid::new_v4())),
        max_image_bytes: 5 * 1024 * 1024,
        page_size: 10,
        login_max_attempts: 5,
        login_window_seconds: 300,
        login_ban_seconds: 900,
        admin_username: None,
        admin_password: None,
        cors_origins: None,
    }
}

/// Application state over a fresh in-memory catalog
pub fn test_state(config: AppConfig) -> (AppState, InMemoryCatalog) {
    let catalog = InMemoryCatalog::new();
    let state = AppState::new(
        config,
        None,
        Arc::new(catalog.clone()),
        Arc::new(catalog.clone()),
        Arc::new(catalog.clone()),
    );
    (state, catalog)
}

/// Create a user and return a signed token for it
pub async fn token_for(state: &AppState, username: &str, role: Role) -> String {
    let user = state
        .users
        .create(&NewUser {
            username: username.to_string(),
            password: "password123".to_string(),
            role,
        })
        .await
        .unwrap();
    state.jwt_service.issue(&user).unwrap()
}

/// Drive the router with one request and decode the JSON body (`Null` when empty)
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn request_builder(method: &str, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    request_builder(method, uri, token).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    request_builder(method, uri, token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "catalog-test-boundary";

/// Build a `multipart/form-data` request with text fields and an optional `image` part
pub fn multipart_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    request_builder(method, uri, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
