use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartList, MigrateCartResponse, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Shopper},
    models::{CartItem, GUEST_USER_ID, Product, is_image_data_url},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

pub async fn list_cart(
    pool: &DbPool,
    shopper: &Shopper,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let items = sqlx::query_as::<_, CartItem>(
        "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(shopper.user_id.as_str())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(shopper.user_id.as_str())
        .fetch_one(pool)
        .await?;

    let subtotal = cart_subtotal(pool, &shopper.user_id).await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "OK",
        CartList { items, subtotal },
        Some(meta),
    ))
}

/// Sum of line totals over every line of the shopper's cart. Also the
/// subtotal coupons are validated against.
pub async fn cart_subtotal(pool: &DbPool, user_id: &str) -> AppResult<i64> {
    let items = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(items.iter().map(CartItem::line_total).sum())
}

pub async fn add_to_cart(
    pool: &DbPool,
    shopper: &Shopper,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    for attachment in &payload.attachments {
        if !is_image_data_url(attachment) {
            return Err(AppError::BadRequest(
                "attachments must be base64 image data URLs".to_string(),
            ));
        }
    }

    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let deltas = product
        .options
        .resolve_selection(&payload.selected_options)
        .map_err(AppError::BadRequest)?;

    // One line per (user, product, selected options); jsonb equality makes
    // the option comparison structural.
    let exist: Option<CartItem> = sqlx::query_as(
        "SELECT * FROM cart_items WHERE user_id = $1 AND product_id = $2 AND selected_options = $3",
    )
    .bind(shopper.user_id.as_str())
    .bind(payload.product_id)
    .bind(Json(&payload.selected_options))
    .fetch_optional(pool)
    .await?;

    let cart_item = if let Some(item) = exist {
        let attachments = if payload.attachments.is_empty() {
            item.attachments.0.clone()
        } else {
            payload.attachments
        };
        sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart_items
            SET quantity = quantity + $3, attachments = $4
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(shopper.user_id.as_str())
        .bind(payload.quantity)
        .bind(Json(attachments))
        .fetch_one(pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            INSERT INTO cart_items
                (id, user_id, product_id, product_name, unit_price, image,
                 selected_options, option_deltas, attachments, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(shopper.user_id.as_str())
        .bind(product.id)
        .bind(product.name.as_str())
        .bind(product.price)
        .bind(product.image.as_deref())
        .bind(Json(&payload.selected_options))
        .bind(Json(&deltas))
        .bind(Json(&payload.attachments))
        .bind(payload.quantity)
        .fetch_one(pool)
        .await?
    };

    if let Err(err) = log_audit(
        pool,
        shopper.audit_actor(),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({
            "shopper": shopper.user_id,
            "product_id": payload.product_id,
            "quantity": payload.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn update_cart_item(
    pool: &DbPool,
    shopper: &Shopper,
    id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let item: Option<CartItem> = sqlx::query_as(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(shopper.user_id.as_str())
    .bind(payload.quantity)
    .fetch_optional(pool)
    .await?;

    match item {
        Some(item) => Ok(ApiResponse::success("OK", item, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn remove_from_cart(
    pool: &DbPool,
    shopper: &Shopper,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(shopper.user_id.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        shopper.audit_actor(),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "shopper": shopper.user_id, "cart_item_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    pool: &DbPool,
    shopper: &Shopper,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(shopper.user_id.as_str())
        .execute(pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": result.rows_affected() }),
        Some(Meta::empty()),
    ))
}

/// Fold the shared guest cart and wishlist into the freshly authenticated
/// user's. Lines that collide on (product, selected options) merge by
/// summing quantities; the guest attachments win when non-empty, being the
/// newer of the two.
pub async fn migrate_cart(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<MigrateCartResponse>> {
    let user_id = user.user_id.to_string();
    let mut txn = pool.begin().await?;

    let guest_lines: Vec<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE user_id = $1")
            .bind(GUEST_USER_ID)
            .fetch_all(&mut *txn)
            .await?;

    let mut merged = 0i64;
    let mut moved = 0i64;

    for line in guest_lines {
        let existing: Option<CartItem> = sqlx::query_as(
            "SELECT * FROM cart_items WHERE user_id = $1 AND product_id = $2 AND selected_options = $3",
        )
        .bind(user_id.as_str())
        .bind(line.product_id)
        .bind(&line.selected_options)
        .fetch_optional(&mut *txn)
        .await?;

        if let Some(existing) = existing {
            let attachments = if line.attachments.0.is_empty() {
                existing.attachments
            } else {
                line.attachments
            };
            sqlx::query("UPDATE cart_items SET quantity = $2, attachments = $3 WHERE id = $1")
                .bind(existing.id)
                .bind(existing.quantity + line.quantity)
                .bind(attachments)
                .execute(&mut *txn)
                .await?;
            sqlx::query("DELETE FROM cart_items WHERE id = $1")
                .bind(line.id)
                .execute(&mut *txn)
                .await?;
            merged += 1;
        } else {
            sqlx::query("UPDATE cart_items SET user_id = $2 WHERE id = $1")
                .bind(line.id)
                .bind(user_id.as_str())
                .execute(&mut *txn)
                .await?;
            moved += 1;
        }
    }

    let migrated_wishlist = sqlx::query(
        r#"
        UPDATE wishlist_items SET user_id = $1
        WHERE user_id = $2
          AND product_id NOT IN (SELECT product_id FROM wishlist_items WHERE user_id = $1)
        "#,
    )
    .bind(user_id.as_str())
    .bind(GUEST_USER_ID)
    .execute(&mut *txn)
    .await?
    .rows_affected() as i64;

    // Whatever is left guest-side already exists for the user.
    sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1")
        .bind(GUEST_USER_ID)
        .execute(&mut *txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_migrate",
        Some("cart_items"),
        Some(serde_json::json!({ "merged": merged, "moved": moved })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cart migrated",
        MigrateCartResponse {
            migrated_lines: moved,
            merged_lines: merged,
            migrated_wishlist,
        },
        Some(Meta::empty()),
    ))
}
