use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub product_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub items: Vec<Review>,
    pub average_rating: Option<f64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route("/product/{product_id}", get(list_product_reviews))
        .route("/{id}", delete(delete_review))
}

#[utoipa::path(
    get,
    path = "/api/reviews/product/{product_id}",
    params(
        ("product_id" = i64, Path, description = "Product ID"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List a product's reviews", body = ApiResponse<ReviewList>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Reviews"
)]
pub async fn list_product_reviews(
    State(pool): State<DbPool>,
    Path(product_id): Path<i64>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let product_exist: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::NotFound);
    }

    let (page, limit, offset) = pagination.normalize();
    let items = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let stats: (i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*), AVG(rating)::FLOAT8 FROM reviews WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(&pool)
    .await?;

    let meta = Meta::new(page, limit, stats.0);
    Ok(Json(ApiResponse::success(
        "Reviews",
        ReviewList {
            items,
            average_rating: stats.1,
        },
        Some(meta),
    )))
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Create review", body = ApiResponse<Review>),
        (status = 400, description = "Invalid rating or duplicate review"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(pool): State<DbPool>,
    user: AuthUser,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".into(),
        ));
    }

    let product_exist: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::NotFound);
    }

    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM reviews WHERE product_id = $1 AND user_id = $2")
            .bind(payload.product_id)
            .bind(user.user_id)
            .fetch_optional(&pool)
            .await?;
    if exist.is_some() {
        return Err(AppError::BadRequest(
            "you have already reviewed this product".into(),
        ));
    }

    let review: Review = sqlx::query_as(
        r#"
        INSERT INTO reviews (id, product_id, user_id, rating, comment)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.product_id)
    .bind(user.user_id)
    .bind(payload.rating)
    .bind(payload.comment)
    .fetch_one(&pool)
    .await?;

    if let Err(err) = log_audit(
        &pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "product_id": review.product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(Json(ApiResponse::success("Review created", review, None)))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Deleted review"),
        (status = 404, description = "Review not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    // Owners delete their own reviews; admins may delete any.
    let result = if user.role == "admin" {
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await?
    } else {
        sqlx::query("DELETE FROM reviews WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.user_id)
            .execute(&pool)
            .await?
    };

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}
