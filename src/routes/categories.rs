use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, is_image_data_url},
    response::{ApiResponse, Meta},
    routes::params::CategoryQuery,
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryList {
    #[schema(value_type = Vec<Category>)]
    pub items: Vec<Category>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

#[utoipa::path(
    get,
    path = "/api/categories",
    params(
        ("parent_id" = Option<i64>, Query, description = "Only direct children of this category")
    ),
    responses(
        (status = 200, description = "List categories", body = ApiResponse<CategoryList>)
    ),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(pool): State<DbPool>,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let items = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE ($1::BIGINT IS NULL OR parent_id = $1) ORDER BY name",
    )
    .bind(query.parent_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Get category", body = ApiResponse<Category>),
        (status = 404, description = "Category not found"),
    ),
    tag = "Catalog"
)]
pub async fn get_category(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let result = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    let result = match result {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    Ok(Json(ApiResponse::success("Category", result, None)))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 200, description = "Create category", body = ApiResponse<Category>),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_category(
    State(pool): State<DbPool>,
    user: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    ensure_admin(&user)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    validate_image(payload.image.as_deref())?;
    if let Some(parent_id) = payload.parent_id {
        ensure_category_exists(&pool, parent_id).await?;
    }

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, description, parent_id, image) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(payload.description)
    .bind(payload.parent_id)
    .bind(payload.image)
    .fetch_one(&pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Category created",
        category,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated category", body = ApiResponse<Category>),
        (status = 404, description = "Category not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn update_category(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    ensure_admin(&user)?;
    validate_image(payload.image.as_deref())?;

    let existing = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    if let Some(parent_id) = payload.parent_id {
        if parent_id == id {
            return Err(AppError::BadRequest(
                "category cannot be its own parent".into(),
            ));
        }
        ensure_category_exists(&pool, parent_id).await?;
    }

    let name = payload.name.unwrap_or(existing.name);
    let description = payload.description.or(existing.description);
    let parent_id = payload.parent_id.or(existing.parent_id);
    let image = payload.image.or(existing.image);

    let category = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories
        SET name = $2, description = $3, parent_id = $4, image = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(parent_id)
    .bind(image)
    .fetch_one(&pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Updated",
        category,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Deleted category"),
        (status = 400, description = "Category still referenced"),
        (status = 404, description = "Category not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn delete_category(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;

    let referenced: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (SELECT 1 FROM categories WHERE parent_id = $1)
            OR EXISTS (SELECT 1 FROM products WHERE category_id = $1)
        "#,
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;
    if referenced.0 {
        return Err(AppError::BadRequest(
            "category still has subcategories or products".into(),
        ));
    }

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
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

fn validate_image(image: Option<&str>) -> AppResult<()> {
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
        return Err(AppError::BadRequest("parent category not found".into()));
    }
    Ok(())
}
