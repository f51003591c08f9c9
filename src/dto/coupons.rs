use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{models::Coupon, pricing::DiscountType};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    #[serde(default)]
    pub min_order_amount: i64,
    pub max_usage: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

/// Partial update; omitted fields keep their current value. Clearing
/// `max_usage` or `expires_at` is intentionally unsupported — deactivate the
/// coupon and create a new one instead.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCouponRequest {
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<i64>,
    pub min_order_amount: Option<i64>,
    pub max_usage: Option<i32>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCouponRequest {
    pub code: String,
}

/// Preview of what a coupon would do to the caller's current cart.
#[derive(Debug, Serialize, ToSchema)]
pub struct CouponPreview {
    pub code: String,
    pub subtotal: i64,
    pub discount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CouponList {
    #[schema(value_type = Vec<Coupon>)]
    pub items: Vec<Coupon>,
}
