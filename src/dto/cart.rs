use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::models::CartItem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: i64,
    pub quantity: i32,
    #[serde(default)]
    pub selected_options: BTreeMap<String, String>,
    /// Buyer-supplied images (base64 data URLs), e.g. artwork for a
    /// personalized product.
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItem>,
    /// Sum of line totals over the whole cart, not just the current page.
    pub subtotal: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MigrateCartResponse {
    pub migrated_lines: i64,
    pub merged_lines: i64,
    pub migrated_wishlist: i64,
}
