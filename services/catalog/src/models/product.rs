//! Product models for the catalog service

use axum::body::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: String,
}

/// Product annotated with the rounded mean of its review ratings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithRating {
    #[serde(flatten)]
    pub product: Product,
    pub average_rating: f64,
}

/// Validated product creation payload
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: String,
}

/// Validated partial update; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
}

impl ProductChanges {
    /// Merge the changes into an existing product
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(title) = &self.title {
            product.title = title.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = image_url.clone();
        }
    }
}

/// Image file received in a multipart form
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Raw multipart product form, before validation
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub image: Option<UploadedImage>,
}

/// Query parameters for product listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListQuery {
    /// Page number (1-based), parsed during validation
    pub page: Option<String>,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub last_page: i64,
}

impl PageMeta {
    pub fn new(total: i64, page: u32, page_size: u32) -> Self {
        let page_size = i64::from(page_size.max(1));
        Self {
            total,
            page,
            last_page: (total + page_size - 1) / page_size,
        }
    }
}

/// Response for product listing with pagination
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub data: Vec<ProductWithRating>,
    pub meta: PageMeta,
}
