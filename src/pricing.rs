//! Coupon discount calculation and order total reconciliation.
//!
//! Everything here is pure: validation never mutates usage counters, and the
//! clock is passed in. Consuming a coupon (the `used_count` increment) is
//! owned by the checkout transaction in `order_service`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountType::Percentage),
            "fixed" => Some(DiscountType::Fixed),
            _ => None,
        }
    }
}

/// The slice of a coupon the calculator needs, decoupled from storage.
#[derive(Debug, Clone)]
pub struct CouponTerms {
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_order_amount: i64,
    pub max_usage: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Why a coupon does not apply. Returned to the caller verbatim so the
/// storefront can show the reason instead of a silent zero discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon inactive")]
    Inactive,
    #[error("coupon expired")]
    Expired,
    #[error("usage limit reached")]
    UsageLimitReached,
    #[error("order below minimum amount for coupon eligibility")]
    BelowMinimum,
}

/// Decide whether a coupon applies to `subtotal` and compute the discount.
///
/// Preconditions are checked in order and the first failure wins. The
/// returned discount is non-negative and never exceeds the subtotal.
pub fn calculate_discount(
    terms: &CouponTerms,
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<i64, CouponRejection> {
    if !terms.is_active {
        return Err(CouponRejection::Inactive);
    }
    if terms.expires_at.is_some_and(|at| at < now) {
        return Err(CouponRejection::Expired);
    }
    if terms
        .max_usage
        .is_some_and(|cap| terms.used_count >= cap)
    {
        return Err(CouponRejection::UsageLimitReached);
    }
    if subtotal < terms.min_order_amount {
        return Err(CouponRejection::BelowMinimum);
    }

    let discount = match terms.discount_type {
        DiscountType::Percentage => subtotal * terms.discount_value / 100,
        DiscountType::Fixed => terms.discount_value,
    };

    Ok(discount.clamp(0, subtotal))
}

/// Price of one cart line: unit price plus the selected option deltas,
/// times the quantity.
pub fn line_total<'a>(
    unit_price: i64,
    option_deltas: impl IntoIterator<Item = &'a i64>,
    quantity: i32,
) -> i64 {
    let unit = unit_price + option_deltas.into_iter().sum::<i64>();
    unit * i64::from(quantity)
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub discount: i64,
    pub total: i64,
}

/// Authoritative totals: `total = subtotal + delivery_fee - discount`,
/// clamped so it never goes negative.
pub fn reconcile_totals(subtotal: i64, delivery_fee: i64, discount: i64) -> OrderTotals {
    OrderTotals {
        subtotal,
        delivery_fee,
        discount,
        total: (subtotal + delivery_fee - discount).max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(discount_type: DiscountType, value: i64) -> CouponTerms {
        CouponTerms {
            discount_type,
            discount_value: value,
            min_order_amount: 0,
            max_usage: None,
            used_count: 0,
            is_active: true,
            expires_at: None,
        }
    }

    #[test]
    fn percentage_discount_is_proportional_and_capped() {
        let c = coupon(DiscountType::Percentage, 10);
        assert_eq!(calculate_discount(&c, 10_000, Utc::now()), Ok(1_000));

        // 150% clamps to the subtotal, never beyond it.
        let c = coupon(DiscountType::Percentage, 150);
        assert_eq!(calculate_discount(&c, 100, Utc::now()), Ok(100));
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        let c = coupon(DiscountType::Fixed, 3_000);
        assert_eq!(calculate_discount(&c, 10_000, Utc::now()), Ok(3_000));
        assert_eq!(calculate_discount(&c, 2_000, Utc::now()), Ok(2_000));
        assert_eq!(calculate_discount(&c, 0, Utc::now()), Ok(0));
    }

    #[test]
    fn inactive_coupon_is_rejected_first() {
        let mut c = coupon(DiscountType::Fixed, 100);
        c.is_active = false;
        // Also expired; inactivity must win because checks are ordered.
        c.expires_at = Some(Utc::now() - Duration::hours(1));
        assert_eq!(
            calculate_discount(&c, 10_000, Utc::now()),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn expired_coupon_is_rejected() {
        let mut c = coupon(DiscountType::Percentage, 10);
        c.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert_eq!(
            calculate_discount(&c, 10_000, Utc::now()),
            Err(CouponRejection::Expired)
        );

        c.expires_at = Some(Utc::now() + Duration::minutes(1));
        assert!(calculate_discount(&c, 10_000, Utc::now()).is_ok());
    }

    #[test]
    fn exhausted_coupon_is_rejected_regardless_of_subtotal() {
        let mut c = coupon(DiscountType::Percentage, 10);
        c.max_usage = Some(5);
        c.used_count = 5;
        for subtotal in [0, 100, 1_000_000] {
            assert_eq!(
                calculate_discount(&c, subtotal, Utc::now()),
                Err(CouponRejection::UsageLimitReached)
            );
        }
    }

    #[test]
    fn order_below_minimum_is_rejected() {
        let mut c = coupon(DiscountType::Fixed, 3_000);
        c.min_order_amount = 5_000;

        assert_eq!(calculate_discount(&c, 10_000, Utc::now()), Ok(3_000));
        assert_eq!(
            calculate_discount(&c, 4_000, Utc::now()),
            Err(CouponRejection::BelowMinimum)
        );
    }

    #[test]
    fn line_total_includes_option_deltas() {
        let no_deltas: [i64; 0] = [];
        assert_eq!(line_total(1_000, no_deltas.iter(), 3), 3_000);
        assert_eq!(line_total(1_000, [200, 50].iter(), 2), 2_500);
    }

    #[test]
    fn totals_clamp_at_zero() {
        let t = reconcile_totals(10_000, 500, 3_000);
        assert_eq!(t.total, 7_500);

        // Discount larger than subtotal with no delivery fee: zero, not negative.
        let t = reconcile_totals(100, 0, 150);
        assert_eq!(t.total, 0);
    }

    #[test]
    fn rejection_messages_are_distinguishable() {
        assert_eq!(CouponRejection::Inactive.to_string(), "coupon inactive");
        assert_eq!(CouponRejection::Expired.to_string(), "coupon expired");
        assert_eq!(
            CouponRejection::UsageLimitReached.to_string(),
            "usage limit reached"
        );
        assert_eq!(
            CouponRejection::BelowMinimum.to_string(),
            "order below minimum amount for coupon eligibility"
        );
    }
}
