use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::cart::{AddToCartRequest, CartList, MigrateCartResponse, UpdateCartItemRequest},
    error::AppResult,
    middleware::auth::{AuthUser, Shopper},
    models::CartItem,
    response::ApiResponse,
    routes::params::Pagination,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart).delete(clear_cart))
        .route("/migrate", post(migrate_cart))
        .route("/{id}", patch(update_cart_item).delete(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List cart items for the current shopper", body = ApiResponse<CartList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(pool): State<DbPool>,
    shopper: Shopper,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&pool, &shopper, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add a line or merge into an existing one", body = ApiResponse<CartItem>),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(pool): State<DbPool>,
    shopper: Shopper,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::add_to_cart(&pool, &shopper, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart line ID")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Update line quantity", body = ApiResponse<CartItem>),
        (status = 404, description = "Cart line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(pool): State<DbPool>,
    shopper: Shopper,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::update_cart_item(&pool, &shopper, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart line ID")),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(pool): State<DbPool>,
    shopper: Shopper,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_from_cart(&pool, &shopper, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(delete, path = "/api/cart", tag = "Cart")]
pub async fn clear_cart(
    State(pool): State<DbPool>,
    shopper: Shopper,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::clear_cart(&pool, &shopper).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/migrate",
    responses(
        (status = 200, description = "Merge the guest cart and wishlist into the caller's", body = ApiResponse<MigrateCartResponse>),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn migrate_cart(
    State(pool): State<DbPool>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<MigrateCartResponse>>> {
    let resp = cart_service::migrate_cart(&pool, &user).await?;
    Ok(Json(resp))
}
