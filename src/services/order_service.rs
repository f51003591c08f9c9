use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        coupons::{Column as CouponCol, Entity as Coupons},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::Shopper,
    models::{Order, OrderItem, OrderStatus},
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::coupon_service,
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    shopper: &Shopper,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(shopper.user_id.clone()));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn checkout(
    state: &AppState,
    shopper: &Shopper,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.shipping_address.trim().is_empty() {
        return Err(AppError::BadRequest("shipping address is required".into()));
    }
    if payload.payment_method.trim().is_empty() {
        return Err(AppError::BadRequest("payment method is required".into()));
    }
    let coupon_code = payload
        .coupon_code
        .as_deref()
        .map(coupon_service::normalize_code)
        .filter(|c| !c.is_empty());

    let txn = state.orm.begin().await?;

    let cart_rows = CartItems::find()
        .filter(CartCol::UserId.eq(shopper.user_id.clone()))
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if cart_rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    // Price every line from the live product row; the cart's stored price is
    // display-only and may be stale.
    let mut subtotal: i64 = 0;
    let mut priced_lines = Vec::with_capacity(cart_rows.len());
    for row in cart_rows {
        if row.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        let product = Products::find_by_id(row.product_id).one(&txn).await?;
        let product = match product {
            Some(p) => p,
            None => {
                return Err(AppError::BadRequest(format!(
                    "Product {} is no longer available",
                    row.product_id
                )));
            }
        };
        let deltas: BTreeMap<String, i64> = serde_json::from_value(row.option_deltas.clone())
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("corrupt option deltas on cart line: {e}"))
            })?;
        let total_price = pricing::line_total(product.price, deltas.values(), row.quantity);
        subtotal += total_price;
        priced_lines.push((row, product, total_price));
    }

    let mut discount: i64 = 0;
    if let Some(code) = coupon_code.as_deref() {
        let coupon = Coupons::find()
            .filter(CouponCol::Code.eq(code))
            .one(&txn)
            .await?;
        let coupon = match coupon {
            Some(c) => c,
            None => return Err(AppError::BadRequest("invalid coupon code".into())),
        };

        let terms = coupon_service::terms_from_coupon(&coupon_from_entity(&coupon))?;
        discount = pricing::calculate_discount(&terms, subtotal, Utc::now())
            .map_err(|reason| AppError::BadRequest(reason.to_string()))?;

        // Consume one use with the cap re-checked inside the UPDATE, so two
        // concurrent checkouts cannot both take the last slot.
        let consumed = Coupons::update_many()
            .col_expr(
                CouponCol::UsedCount,
                Expr::col(CouponCol::UsedCount).add(1),
            )
            .col_expr(
                CouponCol::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(CouponCol::Id.eq(coupon.id))
            .filter(CouponCol::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(CouponCol::MaxUsage.is_null())
                    .add(Expr::col(CouponCol::UsedCount).lt(Expr::col(CouponCol::MaxUsage))),
            )
            .exec(&txn)
            .await?;
        if consumed.rows_affected == 0 {
            return Err(AppError::BadRequest("usage limit reached".into()));
        }
    }

    let totals = pricing::reconcile_totals(subtotal, state.delivery_fee, discount);

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(shopper.user_id.clone()),
        shipping_address: Set(payload.shipping_address),
        payment_method: Set(payload.payment_method),
        subtotal: Set(totals.subtotal),
        delivery_fee: Set(totals.delivery_fee),
        coupon_code: Set(coupon_code),
        coupon_discount: Set(totals.discount),
        total: Set(totals.total),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        delivered_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();
    for (row, product, total_price) in priced_lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            product_name: Set(product.name.clone()),
            unit_price: Set(product.price),
            quantity: Set(row.quantity),
            selected_options: Set(row.selected_options.clone()),
            option_deltas: Set(row.option_deltas.clone()),
            total_price: Set(total_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        order_items.push(order_item_from_entity(item)?);
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(shopper.user_id.clone()))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        shopper.audit_actor(),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": order.total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: order_from_entity(order),
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    shopper: &Shopper,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(shopper.user_id.clone()))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Shoppers may cancel their own order while it is still pending; anything
/// further along belongs to the admin status flow.
pub async fn cancel_order(
    state: &AppState,
    shopper: &Shopper,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(shopper.user_id.clone()))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("order {} has invalid status", order.id))
    })?;
    if !current.can_transition_to(OrderStatus::Cancelled) {
        return Err(AppError::BadRequest(format!(
            "cannot cancel an order in status {current}"
        )));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        shopper.audit_actor(),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        shipping_address: model.shipping_address,
        payment_method: model.payment_method,
        subtotal: model.subtotal,
        delivery_fee: model.delivery_fee,
        coupon_code: model.coupon_code,
        coupon_discount: model.coupon_discount,
        total: model.total,
        status: model.status,
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> AppResult<OrderItem> {
    let selected_options = serde_json::from_value(model.selected_options)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt order item options: {e}")))?;
    let option_deltas = serde_json::from_value(model.option_deltas)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt order item deltas: {e}")))?;
    Ok(OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        unit_price: model.unit_price,
        quantity: model.quantity,
        selected_options: sqlx::types::Json(selected_options),
        option_deltas: sqlx::types::Json(option_deltas),
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn coupon_from_entity(model: &crate::entity::coupons::Model) -> crate::models::Coupon {
    crate::models::Coupon {
        id: model.id,
        code: model.code.clone(),
        discount_type: model.discount_type.clone(),
        discount_value: model.discount_value,
        min_order_amount: model.min_order_amount,
        max_usage: model.max_usage,
        used_count: model.used_count,
        is_active: model.is_active,
        expires_at: model.expires_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
