//! Review models for the catalog service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Review entity as stored
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: i32,
    pub product_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Review as returned to clients; the author is never echoed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: i32,
    pub product_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            product_id: review.product_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

/// Validated review creation payload
#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
}

/// Raw review submission body
///
/// Fields are kept loosely typed so that every invalid field can be reported
/// at once instead of failing on the first JSON type mismatch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReviewRequest {
    pub product_id: Option<serde_json::Value>,
    pub rating: Option<serde_json::Value>,
    pub comment: Option<String>,
}

/// Ordering applied to a review listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewSort {
    #[default]
    Newest,
    Highest,
    Lowest,
}

impl ReviewSort {
    /// SQL ORDER BY clause, including the identifier tie-break
    pub fn order_clause(self) -> &'static str {
        match self {
            ReviewSort::Newest => "created_at DESC, id ASC",
            ReviewSort::Highest => "rating DESC, id ASC",
            ReviewSort::Lowest => "rating ASC, id ASC",
        }
    }

    /// In-memory equivalent of [`ReviewSort::order_clause`]
    pub fn compare(self, a: &Review, b: &Review) -> Ordering {
        let primary = match self {
            ReviewSort::Newest => b.created_at.cmp(&a.created_at),
            ReviewSort::Highest => b.rating.cmp(&a.rating),
            ReviewSort::Lowest => a.rating.cmp(&b.rating),
        };
        primary.then(a.id.cmp(&b.id))
    }
}

/// Anything other than `highest` or `lowest` lists newest first
impl From<&str> for ReviewSort {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "highest" => ReviewSort::Highest,
            "lowest" => ReviewSort::Lowest,
            _ => ReviewSort::Newest,
        }
    }
}

/// Query parameters for review listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewQuery {
    pub sort: Option<String>,
    pub search: Option<String>,
}

/// Validated review listing filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewFilter {
    pub sort: ReviewSort,
    /// Case-insensitive substring of the comment; empty matches everything
    pub search: String,
}

impl ReviewFilter {
    pub fn matches(&self, review: &Review) -> bool {
        if self.search.is_empty() {
            return true;
        }
        review
            .comment
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .contains(&self.search.to_lowercase())
    }
}

/// One bucket of a rating distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatingBucket {
    pub rating: i32,
    pub count: i64,
}
