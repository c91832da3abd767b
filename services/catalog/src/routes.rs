//! Catalog service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{
        HeaderValue, Method, StatusCode, Uri,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::{any::Any, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, error, warn};

use crate::{config::AppConfig, error::ApiError, state::AppState};

pub mod auth;
pub mod products;
pub mod reviews;
pub mod uploads;

/// Room for the text fields and multipart framing around the image
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Create the router for the catalog service
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_image_bytes + FORM_OVERHEAD_BYTES)
        .unwrap_or(usize::MAX);
    let cors = cors_layer(&state.config);

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(auth::login))
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/:id/reviews", get(reviews::list_reviews))
        .route(
            "/products/:id/ratings/distribution",
            get(reviews::rating_distribution),
        )
        .route("/reviews", post(reviews::add_review))
        .route("/uploads/:file", get(uploads::serve_upload))
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state);

    with_middleware(router)
}

/// Browser access for the storefront and admin front-ends
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = config.allowed_origins();
    let allow_origin = if origins.is_empty() || origins.contains(&"*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.into_iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!("Ignoring invalid CORS origin {:?}", origin))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60))
}

/// Request tracing around panic recovery, so a panicking handler is logged as a 500
fn with_middleware(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
            .layer(CatchPanicLayer::custom(render_panic)),
    )
}

fn render_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");

    error!("Handler panicked: {}", detail);
    ApiError::Internal(anyhow::anyhow!("handler panicked")).into_response()
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "ok",
            _ => "unavailable",
        },
        None => "disabled",
    };

    let (status, summary) = if database == "unavailable" {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        status,
        Json(json!({
            "status": summary,
            "service": "catalog-service",
            "database": database,
        })),
    )
}

async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    warn!("No route for {} {}", method, uri.path());
    ApiError::NotFound(format!("Route non trouvée: {} {}", method, uri.path()))
}
