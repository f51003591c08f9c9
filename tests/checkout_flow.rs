mod common;

use std::collections::BTreeMap;

use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    dto::{cart::AddToCartRequest, orders::CheckoutRequest},
    entity::{
        AuditLogs, CartItems, Coupons,
        audit_logs::Column as AuditCol,
        cart_items::Column as CartCol,
        coupons::ActiveModel as CouponActive,
    },
    middleware::auth::AuthUser,
    models::{OptionChoice, OptionSchema},
    routes::admin::UpdateOrderStatusRequest,
    services::{admin_service, cart_service, order_service},
};
use uuid::Uuid;

fn tee_schema() -> OptionSchema {
    OptionSchema::Apparel {
        sizes: vec![
            OptionChoice {
                label: "M".into(),
                price_delta: 0,
            },
            OptionChoice {
                label: "XL".into(),
                price_delta: 200,
            },
        ],
        colors: vec![OptionChoice {
            label: "black".into(),
            price_delta: 0,
        }],
    }
}

fn selection(size: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("size".to_string(), size.to_string()),
        ("color".to_string(), "black".to_string()),
    ])
}

async fn seed_coupon(
    state: &storefront_api::state::AppState,
    code: &str,
    max_usage: Option<i32>,
) -> anyhow::Result<Uuid> {
    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        discount_type: Set("fixed".into()),
        discount_value: Set(300),
        min_order_amount: Set(2000),
        max_usage: Set(max_usage),
        used_count: Set(0),
        is_active: Set(true),
        expires_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(coupon.id)
}

// Cart merge -> checkout with coupon -> admin walks the status lifecycle.
#[tokio::test]
async fn checkout_with_coupon_and_status_lifecycle() -> anyhow::Result<()> {
    let _db = common::db_guard().await;
    let state = match common::try_setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let user_id = common::create_user(&state, "user", "user@example.com").await?;
    let admin_id = common::create_user(&state, "admin", "admin@example.com").await?;
    let product_id = common::create_product(&state, "Test Tee", 1_900, &tee_schema()).await?;

    let shopper = common::shopper_for(user_id, "user");
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    // Same (product, options) twice merges into one line with summed quantity.
    for _ in 0..2 {
        cart_service::add_to_cart(
            &state.pool,
            &shopper,
            AddToCartRequest {
                product_id,
                quantity: 1,
                selected_options: selection("XL"),
                attachments: vec![],
            },
        )
        .await?;
    }
    // Different options make a distinct line.
    cart_service::add_to_cart(
        &state.pool,
        &shopper,
        AddToCartRequest {
            product_id,
            quantity: 1,
            selected_options: selection("M"),
            attachments: vec![],
        },
    )
    .await?;

    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(shopper.user_id.clone()))
        .all(&state.orm)
        .await?;
    assert_eq!(lines.len(), 2, "expected merged XL line plus M line");
    let xl_line = lines
        .iter()
        .find(|l| l.selected_options["size"] == "XL")
        .expect("XL line");
    assert_eq!(xl_line.quantity, 2);

    let coupon_id = seed_coupon(&state, "TESTCOUPON", Some(1)).await?;

    // XL: (1900 + 200) * 2 = 4200; M: 1900 * 1 = 1900.
    let checkout_resp = order_service::checkout(
        &state,
        &shopper,
        CheckoutRequest {
            shipping_address: "Somewhere 1".into(),
            payment_method: "cash".into(),
            coupon_code: Some("testcoupon".into()),
        },
    )
    .await?;
    let data = checkout_resp.data.unwrap();
    assert_eq!(data.order.subtotal, 6_100);
    assert_eq!(data.order.coupon_discount, 300);
    assert_eq!(data.order.delivery_fee, 500);
    assert_eq!(data.order.total, 6_300);
    assert_eq!(data.order.status, "pending");
    assert_eq!(data.order.coupon_code.as_deref(), Some("TESTCOUPON"));
    assert_eq!(data.items.len(), 2);

    // Checkout cleared the cart and consumed one coupon use.
    let remaining = CartItems::find()
        .filter(CartCol::UserId.eq(shopper.user_id.clone()))
        .all(&state.orm)
        .await?;
    assert!(remaining.is_empty());

    let coupon = Coupons::find_by_id(coupon_id)
        .one(&state.orm)
        .await?
        .expect("coupon");
    assert_eq!(coupon.used_count, 1);

    // The checkout was audited.
    let audits = AuditLogs::find()
        .filter(AuditCol::Action.eq("checkout"))
        .all(&state.orm)
        .await?;
    assert_eq!(audits.len(), 1);

    // The coupon is exhausted now; a second checkout with it must fail.
    cart_service::add_to_cart(
        &state.pool,
        &shopper,
        AddToCartRequest {
            product_id,
            quantity: 2,
            selected_options: selection("M"),
            attachments: vec![],
        },
    )
    .await?;
    let err = order_service::checkout(
        &state,
        &shopper,
        CheckoutRequest {
            shipping_address: "Somewhere 1".into(),
            payment_method: "cash".into(),
            coupon_code: Some("TESTCOUPON".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("usage limit reached"));

    // Admin walks the lifecycle; delivered stamps the timestamp.
    let order_id = data.order.id;
    for status in ["processing", "shipped"] {
        admin_service::update_order_status(
            &state,
            &auth_admin,
            order_id,
            UpdateOrderStatusRequest {
                status: status.into(),
            },
        )
        .await?;
    }
    let delivered = admin_service::update_order_status(
        &state,
        &auth_admin,
        order_id,
        UpdateOrderStatusRequest {
            status: "delivered".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(delivered.status, "delivered");
    assert!(delivered.delivered_at.is_some());

    // Delivered is terminal.
    let err = admin_service::update_order_status(
        &state,
        &auth_admin,
        order_id,
        UpdateOrderStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Bad Request"));

    Ok(())
}

#[tokio::test]
async fn coupon_below_minimum_is_rejected_and_cancel_only_while_pending() -> anyhow::Result<()> {
    let _db = common::db_guard().await;
    let state = match common::try_setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let user_id = common::create_user(&state, "user", "user2@example.com").await?;
    let admin_id = common::create_user(&state, "admin", "admin2@example.com").await?;
    let product_id =
        common::create_product(&state, "Sleeve", 600, &OptionSchema::Standard).await?;

    let shopper = common::shopper_for(user_id, "user");
    seed_coupon(&state, "MIN2000", None).await?;

    // Subtotal 1200 is below the coupon's 2000 minimum.
    cart_service::add_to_cart(
        &state.pool,
        &shopper,
        AddToCartRequest {
            product_id,
            quantity: 2,
            selected_options: BTreeMap::new(),
            attachments: vec![],
        },
    )
    .await?;
    let err = order_service::checkout(
        &state,
        &shopper,
        CheckoutRequest {
            shipping_address: "Somewhere 2".into(),
            payment_method: "cash".into(),
            coupon_code: Some("MIN2000".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(
        err.to_string()
            .contains("order below minimum amount for coupon eligibility")
    );

    // Without the coupon the order goes through and can be cancelled while pending.
    let order = order_service::checkout(
        &state,
        &shopper,
        CheckoutRequest {
            shipping_address: "Somewhere 2".into(),
            payment_method: "cash".into(),
            coupon_code: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;
    assert_eq!(order.total, 1_200 + 500);

    let cancelled = order_service::cancel_order(&state, &shopper, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");

    // A cancelled order cannot be cancelled again or moved along.
    assert!(order_service::cancel_order(&state, &shopper, order.id)
        .await
        .is_err());
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };
    assert!(
        admin_service::update_order_status(
            &state,
            &auth_admin,
            order.id,
            UpdateOrderStatusRequest {
                status: "processing".into(),
            },
        )
        .await
        .is_err()
    );

    Ok(())
}
