use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    error::{AppError, AppResult},
    middleware::auth::Shopper,
    models::{Product, WishlistItem},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AddWishlistRequest {
    pub product_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct WishlistProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_wishlist).post(add_to_wishlist))
        .route("/{product_id}", delete(remove_from_wishlist))
}

#[utoipa::path(
    get,
    path = "/api/wishlist",
    responses(
        (status = 200, description = "List wishlisted products", body = ApiResponse<WishlistProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn list_wishlist(
    State(pool): State<DbPool>,
    shopper: Shopper,
) -> AppResult<Json<ApiResponse<WishlistProductList>>> {
    let items = sqlx::query_as::<_, Product>(
        r#"
        SELECT p.*
        FROM wishlist_items w
        JOIN products p ON p.id = w.product_id
        WHERE w.user_id = $1
        ORDER BY w.created_at DESC
        "#,
    )
    .bind(shopper.user_id.as_str())
    .fetch_all(&pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Wishlist",
        WishlistProductList { items },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    post,
    path = "/api/wishlist",
    request_body = AddWishlistRequest,
    responses(
        (status = 200, description = "Add product to wishlist", body = ApiResponse<WishlistItem>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn add_to_wishlist(
    State(pool): State<DbPool>,
    shopper: Shopper,
    Json(payload): Json<AddWishlistRequest>,
) -> AppResult<Json<ApiResponse<WishlistItem>>> {
    let product_exist: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::NotFound);
    }

    // Adding twice is a no-op; hand back the existing row.
    let item: WishlistItem = sqlx::query_as(
        r#"
        INSERT INTO wishlist_items (id, user_id, product_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(shopper.user_id.as_str())
    .bind(payload.product_id)
    .fetch_one(&pool)
    .await?;

    if let Err(err) = log_audit(
        &pool,
        shopper.audit_actor(),
        "wishlist_add",
        Some("wishlist_items"),
        Some(serde_json::json!({ "shopper": shopper.user_id, "product_id": payload.product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(Json(ApiResponse::success("OK", item, None)))
}

#[utoipa::path(
    delete,
    path = "/api/wishlist/{product_id}",
    params(
        ("product_id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed from wishlist", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Wishlist entry not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn remove_from_wishlist(
    State(pool): State<DbPool>,
    shopper: Shopper,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(shopper.user_id.as_str())
        .bind(product_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::success(
        "Removed from wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}
