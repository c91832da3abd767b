//! Product endpoints

use anyhow::Context;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AdminUser,
    models::product::{
        NewProduct, PageMeta, ProductChanges, ProductForm, ProductListQuery, ProductPage,
        UploadedImage,
    },
    state::AppState,
    validation::{validate_new_product, validate_page, validate_product_changes},
};

/// Collect the text fields and the image of a product form
async fn read_product_form(mut multipart: Multipart) -> ApiResult<ProductForm> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("title") => form.title = Some(field.text().await?),
            Some("description") => form.description = Some(field.text().await?),
            Some("price") => form.price = Some(field.text().await?),
            Some("image") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked
                if !bytes.is_empty() {
                    form.image = Some(UploadedImage { file_name, bytes });
                }
            }
            _ => continue,
        }
    }

    Ok(form)
}

/// List products, one page at a time
pub async fn list_products(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ProductListQuery>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let page = validate_page(query.page.as_deref())?;
    let page_size = state.config.page_size;

    let (data, total) = state
        .products
        .list(page, page_size)
        .await
        .context("Failed to list products")?;

    Ok(Json(ProductPage {
        data,
        meta: PageMeta::new(total, page, page_size),
    }))
}

/// Get a product by ID
pub async fn get_product(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let product = state
        .products
        .find(id)
        .await
        .context("Failed to get product")?
        .ok_or_else(ApiError::product_not_found)?;

    Ok(Json(product))
}

/// Create a product from a multipart form
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let form = read_product_form(multipart).await?;
    let draft = validate_new_product(form, &state.images)?;

    let image_url = state
        .images
        .save(&draft.image)
        .await
        .context("Failed to store product image")?;

    let created = state
        .products
        .create(&NewProduct {
            title: draft.title,
            description: draft.description,
            price: draft.price,
            image_url: image_url.clone(),
        })
        .await;

    let product = match created {
        Ok(product) => product,
        Err(e) => {
            state.images.discard(&image_url).await;
            return Err(e.context("Failed to create product").into());
        }
    };

    info!("Admin {} created product {}", admin.user_id, product.id);
    Ok((StatusCode::CREATED, Json(product)))
}

/// Partially update a product
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let form = read_product_form(multipart).await?;
    let patch = validate_product_changes(form, &state.images)?;

    if !state
        .products
        .exists(id)
        .await
        .context("Failed to check product")?
    {
        return Err(ApiError::product_not_found());
    }

    let image_url = match &patch.image {
        Some(image) => Some(
            state
                .images
                .save(image)
                .await
                .context("Failed to store product image")?,
        ),
        None => None,
    };

    let changes = ProductChanges {
        title: patch.title,
        description: patch.description,
        price: patch.price,
        image_url,
    };

    let updated = match state.products.update(id, &changes).await {
        Ok(Some(product)) => Ok(product),
        Ok(None) => Err(ApiError::product_not_found()),
        Err(e) => Err(e.context("Failed to update product").into()),
    };

    let product = match updated {
        Ok(product) => product,
        Err(e) => {
            // Deleted concurrently or the write failed; the new image is unreferenced
            if let Some(url) = &changes.image_url {
                state.images.discard(url).await;
            }
            return Err(e);
        }
    };

    info!("Admin {} updated product {}", admin.user_id, id);
    Ok(Json(product))
}

/// Delete a product and its reviews
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .products
        .delete(id)
        .await
        .context("Failed to delete product")?;

    if !deleted {
        return Err(ApiError::product_not_found());
    }

    info!("Admin {} deleted product {}", admin.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}
