//! Product repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{debug, info};

use super::ProductRepository;
use crate::models::product::{NewProduct, Product, ProductChanges, ProductWithRating};

/// Product repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    /// Create a new product repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn product_from_row(row: &PgRow) -> Product {
    Product {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        price: row.get("price"),
        image_url: row.get("image_url"),
    }
}

fn rated_product_from_row(row: &PgRow) -> ProductWithRating {
    ProductWithRating {
        product: product_from_row(row),
        average_rating: row.get("average_rating"),
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn list(&self, page: u32, page_size: u32) -> Result<(Vec<ProductWithRating>, i64)> {
        let limit = i64::from(page_size);
        let offset = i64::from(page.saturating_sub(1)) * limit;
        debug!("Listing products: limit={}, offset={}", limit, offset);

        let rows = sqlx::query(
            r#"
            SELECT p.id, p.title, p.description, p.price, p.image_url,
                   COALESCE(ROUND(AVG(r.rating)::numeric, 1), 0)::float8 AS average_rating
            FROM products p
            LEFT JOIN reviews r ON r.product_id = p.id
            GROUP BY p.id
            ORDER BY p.id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.iter().map(rated_product_from_row).collect(), total))
    }

    async fn find(&self, id: i32) -> Result<Option<ProductWithRating>> {
        let row = sqlx::query(
            r#"
            SELECT p.id, p.title, p.description, p.price, p.image_url,
                   COALESCE(ROUND(AVG(r.rating)::numeric, 1), 0)::float8 AS average_rating
            FROM products p
            LEFT JOIN reviews r ON r.product_id = p.id
            WHERE p.id = $1
            GROUP BY p.id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(rated_product_from_row))
    }

    async fn exists(&self, id: i32) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn create(&self, product: &NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (title, description, price, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, price, image_url
            "#,
        )
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image_url)
        .fetch_one(&self.pool)
        .await?;

        let created = product_from_row(&row);
        info!("Created product {} ({})", created.id, created.title);
        Ok(created)
    }

    async fn update(&self, id: i32, changes: &ProductChanges) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                image_url = COALESCE($5, image_url)
            WHERE id = $1
            RETURNING id, title, description, price, image_url
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(&changes.image_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(product_from_row))
    }

    async fn delete(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("Deleted product {}", id);
        }
        Ok(result.rows_affected() > 0)
    }
}
