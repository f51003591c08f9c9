use axum::{Json, Router, extract::State, routing::post};

use crate::{
    db::DbPool,
    dto::auth::{
        ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, VerifyRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::auth_service::{change_password, login_user, register_user, verify_user},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify", post(verify))
        .route("/login", post(login))
        .route("/change-password", post(change_password_route))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Register user; a verification code is issued", body = ApiResponse<User>),
        (status = 400, description = "Invalid email/password or email taken")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(pool): State<DbPool>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = register_user(&pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verify account with one-time code", body = ApiResponse<User>),
        (status = 400, description = "Invalid or expired code")
    ),
    tag = "Auth"
)]
pub async fn verify(
    State(pool): State<DbPool>,
    Json(payload): Json<VerifyRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = verify_user(&pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(pool): State<DbPool>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = login_user(&pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Change password", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Current password incorrect")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn change_password_route(
    State(pool): State<DbPool>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = change_password(&pool, &user, payload).await?;
    Ok(Json(resp))
}
