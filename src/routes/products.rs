use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{OptionSchema, Product, is_image_data_url},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub category_id: Option<i64>,
    pub image: Option<String>,
    #[serde(default)]
    pub options: OptionSchema,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category_id: Option<i64>,
    pub image: Option<String>,
    pub options: Option<OptionSchema>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("category_id" = Option<i64>, Query, description = "Filter by category"),
        ("q" = Option<String>, Query, description = "Search in name and description"),
        ("min_price" = Option<i64>, Query, description = "Minimum price in cents"),
        ("max_price" = Option<i64>, Query, description = "Maximum price in cents"),
        ("sort_by" = Option<String>, Query, description = "created_at, price or name"),
        ("sort_order" = Option<String>, Query, description = "asc or desc"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(pool): State<DbPool>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let (page, limit, offset) = query.pagination.normalize();
    let sort_col = query.sort_by.unwrap_or(ProductSortBy::CreatedAt).as_sql();
    let sort_dir = query.sort_order.unwrap_or(SortOrder::Desc).as_sql();

    let filter = r#"
        WHERE ($1::BIGINT IS NULL OR category_id = $1)
          AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%')
          AND ($3::BIGINT IS NULL OR price >= $3)
          AND ($4::BIGINT IS NULL OR price <= $4)
    "#;

    // sort_col/sort_dir come from enums, not user text, so the format is safe.
    let items = sqlx::query_as::<_, Product>(&format!(
        "SELECT * FROM products {filter} ORDER BY {sort_col} {sort_dir} LIMIT $5 OFFSET $6"
    ))
    .bind(query.category_id)
    .bind(query.q.as_deref().filter(|s| !s.is_empty()))
    .bind(query.min_price)
    .bind(query.max_price)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products {filter}"))
        .bind(query.category_id)
        .bind(query.q.as_deref().filter(|s| !s.is_empty()))
        .bind(query.min_price)
        .bind(query.max_price)
        .fetch_one(&pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    let data = ProductList { items };
    Ok(Json(ApiResponse::success("Products", data, Some(meta))))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    Path(id): Path<i64>,
    State(pool): State<DbPool>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let result = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(Json(ApiResponse::success("Product", result, None)))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Create product", body = ApiResponse<Product>),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_product(
    State(pool): State<DbPool>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    ensure_admin(&user)?;
    validate_product_fields(&payload.name, payload.price, payload.image.as_deref())?;
    if let Some(category_id) = payload.category_id {
        ensure_category_exists(&pool, category_id).await?;
    }

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (name, description, price, category_id, image, options)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.category_id)
    .bind(payload.image)
    .bind(SqlJson(payload.options))
    .fetch_one(&pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn update_product(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    ensure_admin(&user)?;

    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let name = payload.name.unwrap_or(existing.name);
    let description = payload.description.or(existing.description);
    let price = payload.price.unwrap_or(existing.price);
    let category_id = payload.category_id.or(existing.category_id);
    let image = payload.image.or(existing.image);
    let options = payload.options.map(SqlJson).unwrap_or(existing.options);

    validate_product_fields(&name, price, image.as_deref())?;
    if let Some(category_id) = category_id {
        ensure_category_exists(&pool, category_id).await?;
    }

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET name = $2, description = $3, price = $4, category_id = $5, image = $6, options = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(price)
    .bind(category_id)
    .bind(image)
    .bind(options)
    .fetch_one(&pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Updated",
        product,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Deleted product"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn delete_product(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;

    // Wishlist entries and reviews are meaningless without the product;
    // cart and order lines keep their snapshot and survive the delete.
    sqlx::query("DELETE FROM wishlist_items WHERE product_id = $1")
        .bind(id)
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM reviews WHERE product_id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}

fn validate_product_fields(name: &str, price: i64, image: Option<&str>) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if let Some(image) = image {
        if !is_image_data_url(image) {
            return Err(AppError::BadRequest(
                "image must be a base64 image data URL".into(),
            ));
        }
    }
    Ok(())
}

async fn ensure_category_exists(pool: &DbPool, id: i64) -> AppResult<()> {
    let exist: Option<(i64,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    if exist.is_none() {
        return Err(AppError::BadRequest("category not found".into()));
    }
    Ok(())
}
