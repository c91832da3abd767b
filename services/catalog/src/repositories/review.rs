//! Review repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::{MissingReference, ReviewRepository};
use crate::models::review::{NewReview, Review, ReviewFilter};

/// Review repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgReviewRepository {
    pool: PgPool,
}

impl PgReviewRepository {
    /// Create a new review repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Recognize the foreign keys of the `reviews` table
fn missing_reference(error: &sqlx::Error) -> Option<MissingReference> {
    let sqlx::Error::Database(db) = error else {
        return None;
    };
    if !db.is_foreign_key_violation() {
        return None;
    }
    match db.constraint() {
        Some("reviews_product_id_fkey") => Some(MissingReference::Product),
        Some("reviews_user_id_fkey") => Some(MissingReference::User),
        _ => None,
    }
}

fn review_from_row(row: &PgRow) -> Review {
    Review {
        id: row.get("id"),
        product_id: row.get("product_id"),
        user_id: row.get("user_id"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    async fn list_for_product(&self, product_id: i32, filter: &ReviewFilter) -> Result<Vec<Review>> {
        // The ORDER BY clause comes from a fixed set of static strings
        let sql = format!(
            r#"
            SELECT id, product_id, user_id, rating, comment, created_at
            FROM reviews
            WHERE product_id = $1
              AND ($2 = '' OR POSITION(LOWER($2) IN LOWER(COALESCE(comment, ''))) > 0)
            ORDER BY {}
            "#,
            filter.sort.order_clause()
        );

        let rows = sqlx::query(&sql)
            .bind(product_id)
            .bind(&filter.search)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(review_from_row).collect())
    }

    async fn rating_counts(&self, product_id: i32) -> Result<Vec<(i32, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT rating, COUNT(*) AS count
            FROM reviews
            WHERE product_id = $1
            GROUP BY rating
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("rating"), row.get("count")))
            .collect())
    }

    async fn create(&self, review: &NewReview) -> Result<Review> {
        let row = sqlx::query(
            r#"
            INSERT INTO reviews (product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, product_id, user_id, rating, comment, created_at
            "#,
        )
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match missing_reference(&e) {
            Some(reference) => anyhow::Error::new(reference),
            None => e.into(),
        })?;

        let created = review_from_row(&row);
        info!(
            "User {} reviewed product {} with {} stars",
            created.user_id, created.product_id, created.rating
        );
        Ok(created)
    }
}
