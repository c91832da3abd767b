//! Review endpoints

use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use crate::{
    error::{ApiError, ApiResult},
    jwt::AuthFailure,
    middleware::AuthUser,
    models::review::{AddReviewRequest, NewReview, ReviewQuery, ReviewResponse},
    ratings::rating_distribution as dense_distribution,
    repositories::MissingReference,
    state::AppState,
    validation::{review_filter, validate_review},
};

async fn ensure_product_exists(state: &AppState, id: i32) -> ApiResult<()> {
    let exists = state
        .products
        .exists(id)
        .await
        .context("Failed to check product")?;

    if exists {
        Ok(())
    } else {
        Err(ApiError::product_not_found())
    }
}

/// List the reviews of a product, filtered and sorted
pub async fn list_reviews(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
    WithRejection(Query(query), _): WithRejection<Query<ReviewQuery>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    ensure_product_exists(&state, id).await?;
    let filter = review_filter(&query);

    let reviews = state
        .reviews
        .list_for_product(id, &filter)
        .await
        .context("Failed to list reviews")?;

    Ok(Json(
        reviews
            .into_iter()
            .map(ReviewResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Number of reviews per star rating for a product
pub async fn rating_distribution(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    ensure_product_exists(&state, id).await?;

    let counts = state
        .reviews
        .rating_counts(id)
        .await
        .context("Failed to count ratings")?;

    Ok(Json(dense_distribution(&counts)))
}

/// Add a review as the authenticated user
pub async fn add_review(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    WithRejection(Json(request), _): WithRejection<Json<AddReviewRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let submission = validate_review(&request)?;
    ensure_product_exists(&state, submission.product_id).await?;

    let created = state
        .reviews
        .create(&NewReview {
            product_id: submission.product_id,
            user_id: identity.user_id,
            rating: submission.rating,
            comment: submission.comment,
        })
        .await;

    let review = match created {
        Ok(review) => review,
        Err(e) => {
            return Err(match e.downcast_ref::<MissingReference>() {
                Some(MissingReference::User) => {
                    warn!("Token for unknown user {} rejected", identity.user_id);
                    ApiError::Unauthenticated(AuthFailure::InvalidToken)
                }
                // Deleted between the existence check and the insert
                Some(MissingReference::Product) => ApiError::product_not_found(),
                None => e.context("Failed to create review").into(),
            });
        }
    };

    info!("Review {} added to product {}", review.id, review.product_id);
    Ok((StatusCode::CREATED, Json(ReviewResponse::from(review))))
}

#[cfg(test)]
mod tests {
    use crate::{
        jwt::{Claims, JwtConfig, JwtService},
        models::user::{Role, User},
        routes::create_router,
        testing::{
            InMemoryCatalog, TEST_SECRET, empty_request, json_request, send, test_config,
            test_state, token_for,
        },
    };
    use axum::{Router, http::StatusCode};
    use chrono::{TimeZone, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};

    async fn seeded() -> (Router, InMemoryCatalog, i32, String) {
        let (state, catalog) = test_state(test_config());
        let token = token_for(&state, "bob", Role::User).await;
        let product = catalog.seed_product("lamp").await;

        let at = |minute| Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap();
        catalog.seed_review(product.id, 3, Some("Decent lamp"), at(0)).await;
        catalog.seed_review(product.id, 5, Some("GREAT light"), at(10)).await;
        catalog.seed_review(product.id, 1, None, at(20)).await;
        catalog.seed_review(product.id, 5, Some("great value"), at(5)).await;

        (create_router(state), catalog, product.id, token)
    }

    fn ids(body: &Value) -> Vec<i64> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_default_sort_is_newest_first() {
        let (router, _, id, _) = seeded().await;
        let (status, body) =
            send(router, empty_request("GET", &format!("/products/{id}/reviews"), None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec![3, 2, 4, 1]);
        assert!(body[0].get("userId").is_none());
    }

    #[tokio::test]
    async fn test_highest_and_lowest_break_ties_by_id() {
        let (router, _, id, _) = seeded().await;

        let (_, body) = send(
            router.clone(),
            empty_request("GET", &format!("/products/{id}/reviews?sort=highest"), None),
        )
        .await;
        assert_eq!(ids(&body), vec![2, 4, 1, 3]);

        let (_, body) = send(
            router,
            empty_request("GET", &format!("/products/{id}/reviews?sort=lowest"), None),
        )
        .await;
        assert_eq!(ids(&body), vec![3, 1, 2, 4]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let (router, _, id, _) = seeded().await;
        let (status, body) = send(
            router,
            empty_request(
                "GET",
                &format!("/products/{id}/reviews?search=great&sort=lowest"),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_unknown_sort_lists_newest_first() {
        let (router, _, id, _) = seeded().await;
        let (status, body) = send(
            router,
            empty_request("GET", &format!("/products/{id}/reviews?sort=oldest"), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec![3, 2, 4, 1]);
    }

    #[tokio::test]
    async fn test_reviews_of_missing_product_is_404() {
        let (router, _, _, _) = seeded().await;
        let (status, body) =
            send(router, empty_request("GET", "/products/999999/reviews", None)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Produit non trouvé");
    }

    #[tokio::test]
    async fn test_distribution_is_dense() {
        let (router, _, id, _) = seeded().await;
        let (status, body) = send(
            router,
            empty_request("GET", &format!("/products/{id}/ratings/distribution"), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                { "rating": 1, "count": 1 },
                { "rating": 2, "count": 0 },
                { "rating": 3, "count": 1 },
                { "rating": 4, "count": 0 },
                { "rating": 5, "count": 2 }
            ])
        );
    }

    #[tokio::test]
    async fn test_distribution_without_reviews_is_all_zero() {
        let (state, catalog) = test_state(test_config());
        let product = catalog.seed_product("empty").await;
        let router = create_router(state);

        let (_, body) = send(
            router.clone(),
            empty_request(
                "GET",
                &format!("/products/{}/ratings/distribution", product.id),
                None,
            ),
        )
        .await;
        let counts: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["count"].as_i64().unwrap())
            .collect();
        assert_eq!(counts, vec![0, 0, 0, 0, 0]);

        let (_, body) =
            send(router, empty_request("GET", &format!("/products/{}", product.id), None)).await;
        assert_eq!(body["averageRating"], 0.0);
    }

    #[tokio::test]
    async fn test_distribution_of_missing_product_is_404() {
        let (router, _, _, _) = seeded().await;
        let (status, _) = send(
            router,
            empty_request("GET", "/products/999999/ratings/distribution", None),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rating_bounds_on_submission() {
        let (router, catalog, id, token) = seeded().await;

        for rating in [0, 6] {
            let (status, body) = send(
                router.clone(),
                json_request(
                    "POST",
                    "/reviews",
                    Some(&token),
                    json!({ "productId": id, "rating": rating }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                body["errors"][0]["message"],
                "La note doit être entre 1 et 5 étoiles"
            );
        }

        for rating in [1, 5] {
            let (status, body) = send(
                router.clone(),
                json_request(
                    "POST",
                    "/reviews",
                    Some(&token),
                    json!({ "productId": id, "rating": rating, "comment": "  fine  " }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["rating"], rating);
            assert_eq!(body["comment"], "fine");
            assert_eq!(body["productId"], id);
            assert!(body.get("createdAt").is_some());
        }

        assert_eq!(catalog.review_count().await, 6);
    }

    #[tokio::test]
    async fn test_review_author_comes_from_token() {
        let (router, catalog, id, token) = seeded().await;

        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/reviews",
                Some(&token),
                json!({ "productId": id, "rating": 4, "userId": 999 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let review_id = body["id"].as_i64().unwrap() as i32;
        assert_eq!(catalog.review_author(review_id).await, Some(1));
    }

    #[tokio::test]
    async fn test_review_requires_authentication() {
        let (router, catalog, id, _) = seeded().await;

        let (status, body) = send(
            router,
            json_request("POST", "/reviews", None, json!({ "productId": id, "rating": 4 })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentification requise. Veuillez vous connecter.");
        assert_eq!(catalog.review_count().await, 4);
    }

    #[tokio::test]
    async fn test_expired_token_is_reported() {
        let (router, _, id, _) = seeded().await;
        let now = Utc::now().timestamp() as u64;
        let expired = encode(
            &Header::default(),
            &Claims {
                user_id: 1,
                role: Role::User,
                iat: now - 7200,
                exp: now - 3600,
            },
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/reviews",
                Some(&expired),
                json!({ "productId": id, "rating": 4 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Session expirée. Veuillez vous reconnecter.");
    }

    #[tokio::test]
    async fn test_foreign_token_is_invalid() {
        let (router, _, id, _) = seeded().await;
        let forged = JwtService::new(JwtConfig {
            secret: "someone-else".to_string(),
            expiry_seconds: 3600,
        })
        .issue(&User {
            id: 1,
            username: "bob".to_string(),
            password_hash: String::new(),
            role: Role::Admin,
        })
        .unwrap();

        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/reviews",
                Some(&forged),
                json!({ "productId": id, "rating": 4 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token invalide. Authentification requise.");
    }

    #[tokio::test]
    async fn test_token_for_unknown_user_cannot_review() {
        let (router, catalog, id, _) = seeded().await;
        let (state, _) = test_state(test_config());
        let orphan = state
            .jwt_service
            .issue(&User {
                id: 99,
                username: "gone".to_string(),
                password_hash: String::new(),
                role: Role::User,
            })
            .unwrap();

        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/reviews",
                Some(&orphan),
                json!({ "productId": id, "rating": 4 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token invalide. Authentification requise.");
        assert_eq!(catalog.review_count().await, 4);
    }

    #[tokio::test]
    async fn test_review_for_missing_product_is_404() {
        let (router, _, _, token) = seeded().await;
        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/reviews",
                Some(&token),
                json!({ "productId": 999999, "rating": 4 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Produit non trouvé");
    }
}
