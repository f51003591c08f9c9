mod common;

use std::collections::BTreeMap;

use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    dto::cart::AddToCartRequest,
    entity::{
        CartItems, WishlistItems, cart_items::Column as CartCol,
        wishlist_items::ActiveModel as WishlistActive, wishlist_items::Column as WishCol,
    },
    models::{GUEST_USER_ID, OptionChoice, OptionSchema},
    services::cart_service,
};
use uuid::Uuid;

fn mug_schema() -> OptionSchema {
    OptionSchema::Personalized {
        fields: vec![storefront_api::models::OptionField {
            name: "engraving_font".into(),
            required: false,
            choices: vec![OptionChoice {
                label: "serif".into(),
                price_delta: 300,
            }],
        }],
    }
}

async fn add_wishlist(
    state: &storefront_api::state::AppState,
    user_id: &str,
    product_id: i64,
) -> anyhow::Result<()> {
    WishlistActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id.to_string()),
        product_id: Set(product_id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(())
}

// Guest adds to cart and wishlist, logs in, and everything folds into the
// account by the (product, options) tuple.
#[tokio::test]
async fn guest_cart_and_wishlist_migrate_on_login() -> anyhow::Result<()> {
    let _db = common::db_guard().await;
    let state = match common::try_setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let user_id = common::create_user(&state, "user", "shopper@example.com").await?;
    let mug_id = common::create_product(&state, "Engraved Mug", 1_500, &mug_schema()).await?;
    let sleeve_id =
        common::create_product(&state, "Card Sleeve", 600, &OptionSchema::Standard).await?;

    let guest = common::guest_shopper();
    let shopper = common::shopper_for(user_id, "user");
    let user = shopper.auth.clone().expect("auth user");

    let engraved = BTreeMap::from([("engraving_font".to_string(), "serif".to_string())]);

    // The user already has one engraved mug in their cart...
    cart_service::add_to_cart(
        &state.pool,
        &shopper,
        AddToCartRequest {
            product_id: mug_id,
            quantity: 1,
            selected_options: engraved.clone(),
            attachments: vec![],
        },
    )
    .await?;

    // ...the guest session holds two more of the same line, plus a sleeve.
    cart_service::add_to_cart(
        &state.pool,
        &guest,
        AddToCartRequest {
            product_id: mug_id,
            quantity: 2,
            selected_options: engraved.clone(),
            attachments: vec!["data:image/png;base64,aGVsbG8=".into()],
        },
    )
    .await?;
    cart_service::add_to_cart(
        &state.pool,
        &guest,
        AddToCartRequest {
            product_id: sleeve_id,
            quantity: 1,
            selected_options: BTreeMap::new(),
            attachments: vec![],
        },
    )
    .await?;

    // Wishlists: the mug on both sides, the sleeve only guest-side.
    add_wishlist(&state, &user_id.to_string(), mug_id).await?;
    add_wishlist(&state, GUEST_USER_ID, mug_id).await?;
    add_wishlist(&state, GUEST_USER_ID, sleeve_id).await?;

    let summary = cart_service::migrate_cart(&state.pool, &user)
        .await?
        .data
        .unwrap();
    assert_eq!(summary.merged_lines, 1);
    assert_eq!(summary.migrated_lines, 1);
    assert_eq!(summary.migrated_wishlist, 1);

    // Guest side is empty now.
    let guest_lines = CartItems::find()
        .filter(CartCol::UserId.eq(GUEST_USER_ID))
        .all(&state.orm)
        .await?;
    assert!(guest_lines.is_empty());

    // The user has the merged mug line (1 + 2, guest attachments kept) and
    // the migrated sleeve line.
    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(user_id.to_string()))
        .all(&state.orm)
        .await?;
    assert_eq!(lines.len(), 2);
    let mug_line = lines
        .iter()
        .find(|l| l.product_id == mug_id)
        .expect("mug line");
    assert_eq!(mug_line.quantity, 3);
    assert_eq!(
        mug_line.attachments,
        serde_json::json!(["data:image/png;base64,aGVsbG8="])
    );

    // Wishlist deduplicated by product.
    let wishes = WishlistItems::find()
        .filter(WishCol::UserId.eq(user_id.to_string()))
        .all(&state.orm)
        .await?;
    let mut products: Vec<i64> = wishes.iter().map(|w| w.product_id).collect();
    products.sort_unstable();
    let mut expected = vec![mug_id, sleeve_id];
    expected.sort_unstable();
    assert_eq!(products, expected);

    let guest_wishes = WishlistItems::find()
        .filter(WishCol::UserId.eq(GUEST_USER_ID))
        .all(&state.orm)
        .await?;
    assert!(guest_wishes.is_empty());

    Ok(())
}
