use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::coupons::{
        CouponList, CouponPreview, CreateCouponRequest, UpdateCouponRequest,
        ValidateCouponRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Shopper, ensure_admin},
    models::Coupon,
    pricing::{self, CouponTerms, DiscountType},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::cart_service,
};

/// Codes are stored and compared uppercase so `summer10` finds `SUMMER10`.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn terms_from_coupon(coupon: &Coupon) -> AppResult<CouponTerms> {
    let discount_type = DiscountType::parse(&coupon.discount_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "coupon {} has invalid discount type {:?}",
            coupon.code,
            coupon.discount_type
        ))
    })?;
    Ok(CouponTerms {
        discount_type,
        discount_value: coupon.discount_value,
        min_order_amount: coupon.min_order_amount,
        max_usage: coupon.max_usage,
        used_count: coupon.used_count,
        is_active: coupon.is_active,
        expires_at: coupon.expires_at,
    })
}

pub async fn create_coupon(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;

    let code = normalize_code(&payload.code);
    if code.is_empty() {
        return Err(AppError::BadRequest("coupon code must not be empty".into()));
    }
    if payload.discount_value <= 0 {
        return Err(AppError::BadRequest(
            "discount value must be greater than 0".into(),
        ));
    }
    if payload.min_order_amount < 0 {
        return Err(AppError::BadRequest(
            "minimum order amount must not be negative".into(),
        ));
    }
    if payload.max_usage.is_some_and(|cap| cap <= 0) {
        return Err(AppError::BadRequest(
            "usage cap must be greater than 0".into(),
        ));
    }

    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM coupons WHERE upper(code) = $1")
            .bind(code.as_str())
            .fetch_optional(pool)
            .await?;
    if exist.is_some() {
        return Err(AppError::BadRequest("coupon code already exists".into()));
    }

    let coupon: Coupon = sqlx::query_as(
        r#"
        INSERT INTO coupons
            (id, code, discount_type, discount_value, min_order_amount,
             max_usage, is_active, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(code.as_str())
    .bind(payload.discount_type.as_str())
    .bind(payload.discount_value)
    .bind(payload.min_order_amount)
    .bind(payload.max_usage)
    .bind(payload.is_active)
    .bind(payload.expires_at)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "coupon_create",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Coupon created",
        coupon,
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let items = sqlx::query_as::<_, Coupon>(
        "SELECT * FROM coupons ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coupons")
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Coupons", CouponList { items }, Some(meta)))
}

pub async fn get_coupon(pool: &DbPool, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let coupon: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match coupon {
        Some(c) => Ok(ApiResponse::success("Coupon", c, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_coupon(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;

    let existing: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let discount_type = payload
        .discount_type
        .map(|t| t.as_str().to_string())
        .unwrap_or(existing.discount_type);
    let discount_value = payload.discount_value.unwrap_or(existing.discount_value);
    let min_order_amount = payload.min_order_amount.unwrap_or(existing.min_order_amount);
    let max_usage = payload.max_usage.or(existing.max_usage);
    let is_active = payload.is_active.unwrap_or(existing.is_active);
    let expires_at = payload.expires_at.or(existing.expires_at);

    if discount_value <= 0 {
        return Err(AppError::BadRequest(
            "discount value must be greater than 0".into(),
        ));
    }
    if min_order_amount < 0 {
        return Err(AppError::BadRequest(
            "minimum order amount must not be negative".into(),
        ));
    }

    let coupon: Coupon = sqlx::query_as(
        r#"
        UPDATE coupons
        SET discount_type = $2, discount_value = $3, min_order_amount = $4,
            max_usage = $5, is_active = $6, expires_at = $7, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(discount_type)
    .bind(discount_value)
    .bind(min_order_amount)
    .bind(max_usage)
    .bind(is_active)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "coupon_update",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Updated", coupon, Some(Meta::empty())))
}

pub async fn delete_coupon(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "coupon_delete",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Validation is read-only: the coupon is checked against the shopper's
/// current cart subtotal, computed server-side. Usage is consumed only at
/// checkout.
pub async fn validate_coupon(
    pool: &DbPool,
    shopper: &Shopper,
    payload: ValidateCouponRequest,
) -> AppResult<ApiResponse<CouponPreview>> {
    let code = normalize_code(&payload.code);
    let coupon: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE upper(code) = $1")
        .bind(code.as_str())
        .fetch_optional(pool)
        .await?;
    let coupon = match coupon {
        Some(c) => c,
        None => return Err(AppError::BadRequest("invalid coupon code".into())),
    };

    let subtotal = cart_service::cart_subtotal(pool, &shopper.user_id).await?;
    let terms = terms_from_coupon(&coupon)?;
    let discount = pricing::calculate_discount(&terms, subtotal, Utc::now())
        .map_err(|reason| AppError::BadRequest(reason.to_string()))?;

    Ok(ApiResponse::success(
        "Coupon applies",
        CouponPreview {
            code: coupon.code,
            subtotal,
            discount,
        },
        Some(Meta::empty()),
    ))
}
