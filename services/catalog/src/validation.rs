//! Input validation utilities
//!
//! Every check collects all failing fields before returning, so clients get
//! the complete list of problems in a single response.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    error::{ApiError, FieldError},
    models::{
        product::{ProductForm, UploadedImage},
        review::{AddReviewRequest, ReviewFilter, ReviewQuery, ReviewSort},
        user::LoginRequest,
    },
    ratings::{MAX_RATING, MIN_RATING},
    storage::LocalImageStore,
};

pub const MAX_COMMENT_CHARS: usize = 500;

/// Largest price representable by the `NUMERIC(10, 2)` column
const MAX_PRICE_CENTS: i64 = 99_999_999_99;

const PRICE_MESSAGE: &str = "Le prix doit être un nombre positif";

/// Fully validated product creation form
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub image: UploadedImage,
}

/// Validated update form; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<UploadedImage>,
}

/// Validated review submission
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSubmission {
    pub product_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
}

/// Trimmed value, `None` when absent or blank
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_price(raw: &str) -> Option<Decimal> {
    let price: Decimal = raw.trim().parse().ok()?;
    let price = price.round_dp(2);
    if price > Decimal::ZERO && price <= Decimal::new(MAX_PRICE_CENTS, 2) {
        Some(price)
    } else {
        None
    }
}

/// Validate login credentials
pub fn validate_login(request: &LoginRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if request.username.trim().is_empty() {
        errors.push(FieldError::new("username", "Nom d'utilisateur requis"));
    }
    if request.password.is_empty() {
        errors.push(FieldError::new("password", "Mot de passe requis"));
    }

    ApiError::check(errors)
}

/// Validate a product creation form; every field including the image is required
pub fn validate_new_product(
    form: ProductForm,
    images: &LocalImageStore,
) -> Result<ProductDraft, ApiError> {
    let mut errors = Vec::new();

    let title = non_blank(form.title.as_deref());
    if title.is_none() {
        errors.push(FieldError::new("title", "Le titre est requis"));
    }

    let description = non_blank(form.description.as_deref());
    if description.is_none() {
        errors.push(FieldError::new("description", "La description est requise"));
    }

    let price = form.price.as_deref().and_then(parse_price);
    if price.is_none() {
        errors.push(FieldError::new("price", PRICE_MESSAGE));
    }

    let image = match form.image {
        None => {
            errors.push(FieldError::new("image", "L'image est requise"));
            None
        }
        Some(image) => checked_image(image, images, &mut errors),
    };

    match (title, description, price, image) {
        (Some(title), Some(description), Some(price), Some(image)) if errors.is_empty() => {
            Ok(ProductDraft {
                title,
                description,
                price,
                image,
            })
        }
        _ => Err(ApiError::InvalidInput(errors)),
    }
}

/// Validate a product update form
///
/// Absent or blank fields are left out of the update; a supplied price must
/// still be a positive number and a supplied image must pass the image checks.
pub fn validate_product_changes(
    form: ProductForm,
    images: &LocalImageStore,
) -> Result<ProductPatch, ApiError> {
    let mut errors = Vec::new();

    let price = match non_blank(form.price.as_deref()) {
        Some(raw) => {
            let parsed = parse_price(&raw);
            if parsed.is_none() {
                errors.push(FieldError::new("price", PRICE_MESSAGE));
            }
            parsed
        }
        None => None,
    };

    let image = form
        .image
        .and_then(|image| checked_image(image, images, &mut errors));

    ApiError::check(errors)?;

    Ok(ProductPatch {
        title: non_blank(form.title.as_deref()),
        description: non_blank(form.description.as_deref()),
        price,
        image,
    })
}

fn checked_image(
    image: UploadedImage,
    images: &LocalImageStore,
    errors: &mut Vec<FieldError>,
) -> Option<UploadedImage> {
    match images.check(&image) {
        Some(error) => {
            errors.push(error);
            None
        }
        None => Some(image),
    }
}

/// Validate the page number of a product listing
pub fn validate_page(page: Option<&str>) -> Result<u32, ApiError> {
    match page.map(str::trim) {
        None | Some("") => Ok(1),
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| ApiError::invalid("page", "Numéro de page invalide")),
    }
}

/// Build the review listing filter; unknown sorts fall back to newest first
pub fn review_filter(query: &ReviewQuery) -> ReviewFilter {
    ReviewFilter {
        sort: query.sort.as_deref().map(ReviewSort::from).unwrap_or_default(),
        search: query.search.as_deref().unwrap_or_default().trim().to_string(),
    }
}

fn product_id_from(value: &Value) -> Option<i32> {
    let id = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    i32::try_from(id).ok().filter(|id| *id > 0)
}

/// Validate a review submission
pub fn validate_review(request: &AddReviewRequest) -> Result<ReviewSubmission, ApiError> {
    let mut errors = Vec::new();

    let product_id = match request.product_id.as_ref() {
        None | Some(Value::Null) => {
            errors.push(FieldError::new("productId", "ID produit requis"));
            None
        }
        Some(value) => {
            let id = product_id_from(value);
            if id.is_none() {
                errors.push(FieldError::new("productId", "ID produit invalide"));
            }
            id
        }
    };

    let rating = request
        .rating
        .as_ref()
        .and_then(Value::as_i64)
        .filter(|r| (i64::from(MIN_RATING)..=i64::from(MAX_RATING)).contains(r))
        .map(|r| r as i32);
    if rating.is_none() {
        errors.push(FieldError::new(
            "rating",
            "La note doit être entre 1 et 5 étoiles",
        ));
    }

    let comment = non_blank(request.comment.as_deref());
    if comment
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
    {
        errors.push(FieldError::new(
            "comment",
            "Le commentaire ne doit pas dépasser 500 caractères",
        ));
    }

    match (product_id, rating, errors.is_empty()) {
        (Some(product_id), Some(rating), true) => Ok(ReviewSubmission {
            product_id,
            rating,
            comment,
        }),
        _ => Err(ApiError::InvalidInput(errors)),
    }
}
