use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    error::AppResult,
    middleware::auth::Shopper,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/{id}", get(get_order))
        .route("/{id}/cancel", post(cancel_order))
}

#[utoipa::path(get, path = "/api/orders", tag = "Orders")]
pub async fn list_orders(
    State(state): State<AppState>,
    shopper: Shopper,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &shopper, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Create an order from the cart", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Empty cart or rejected coupon"),
    ),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::checkout(&state, &shopper, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/orders/{id}", tag = "Orders")]
pub async fn get_order(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &shopper, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(post, path = "/api/orders/{id}/cancel", tag = "Orders")]
pub async fn cancel_order(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_order(&state, &shopper, id).await?;
    Ok(Json(resp))
}
