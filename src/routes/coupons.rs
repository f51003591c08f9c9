use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::coupons::{
        CouponList, CouponPreview, CreateCouponRequest, UpdateCouponRequest,
        ValidateCouponRequest,
    },
    error::AppResult,
    middleware::auth::{AuthUser, Shopper},
    models::Coupon,
    response::ApiResponse,
    routes::params::Pagination,
    services::coupon_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route("/validate", post(validate_coupon))
        .route(
            "/{id}",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
}

#[utoipa::path(
    post,
    path = "/api/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Coupon applies to the current cart", body = ApiResponse<CouponPreview>),
        (status = 400, description = "Coupon rejected, with the reason"),
    ),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(pool): State<DbPool>,
    shopper: Shopper,
    Json(payload): Json<ValidateCouponRequest>,
) -> AppResult<Json<ApiResponse<CouponPreview>>> {
    let resp = coupon_service::validate_coupon(&pool, &shopper, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupons",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List coupons (admin only)", body = ApiResponse<CouponList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn list_coupons(
    State(pool): State<DbPool>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp = coupon_service::list_coupons(&pool, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/coupons",
    request_body = CreateCouponRequest,
    responses(
        (status = 200, description = "Create coupon (admin only)", body = ApiResponse<Coupon>),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn create_coupon(
    State(pool): State<DbPool>,
    user: AuthUser,
    Json(payload): Json<CreateCouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::create_coupon(&pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/coupons/{id}", security(("bearer_auth" = [])), tag = "Coupons")]
pub async fn get_coupon(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::get_coupon(&pool, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/coupons/{id}",
    request_body = UpdateCouponRequest,
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn update_coupon(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::update_coupon(&pool, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(delete, path = "/api/coupons/{id}", security(("bearer_auth" = [])), tag = "Coupons")]
pub async fn delete_coupon(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = coupon_service::delete_coupon(&pool, &user, id).await?;
    Ok(Json(resp))
}
