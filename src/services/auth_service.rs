use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use rand::Rng;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::auth::{
        ChangePasswordRequest, Claims, LoginRequest, LoginResponse, RegisterRequest, VerifyRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
};

const VERIFY_CODE_TTL_MINUTES: i64 = 15;

#[derive(Debug, sqlx::FromRow)]
struct UserAuthRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    is_verified: bool,
    verify_code: Option<String>,
    verify_code_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl UserAuthRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            role: self.role,
            is_verified: self.is_verified,
            created_at: self.created_at,
        }
    }
}

pub async fn register_user(
    pool: &DbPool,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest { email, password } = payload;
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let password_hash = hash_password(&password)?;
    let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
    let expires_at = Utc::now() + Duration::minutes(VERIFY_CODE_TTL_MINUTES);
    let id = Uuid::new_v4();

    let user: UserAuthRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, verify_code, verify_code_expires_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(email.as_str())
    .bind(password_hash)
    .bind(code.as_str())
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    // No mailer is wired up; the code is surfaced in the server log so the
    // operator (or a dev environment) can complete verification.
    tracing::info!(email = %user.email, code = %code, "verification code issued");

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
    Ok(ApiResponse::success("User created", user.into_user(), None))
}

pub async fn verify_user(pool: &DbPool, payload: VerifyRequest) -> AppResult<ApiResponse<User>> {
    let email = payload.email.trim().to_lowercase();
    let user: Option<UserAuthRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => {
            return Err(AppError::BadRequest(
                "Invalid email or verification code".into(),
            ));
        }
    };

    if user.is_verified {
        return Err(AppError::BadRequest("Account already verified".into()));
    }

    match (&user.verify_code, user.verify_code_expires_at) {
        (Some(code), _) if code != &payload.code => {
            return Err(AppError::BadRequest("Invalid verification code".into()));
        }
        (Some(_), Some(expires_at)) if expires_at < Utc::now() => {
            return Err(AppError::BadRequest("Verification code expired".into()));
        }
        (Some(_), _) => {}
        (None, _) => {
            return Err(AppError::BadRequest("Invalid verification code".into()));
        }
    }

    // The code is single-use: consume it together with the flag flip.
    let user: UserAuthRow = sqlx::query_as(
        r#"
        UPDATE users
        SET is_verified = TRUE, verify_code = NULL, verify_code_expires_at = NULL
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "user_verify",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Account verified",
        user.into_user(),
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    pool: &DbPool,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let email = email.trim().to_lowercase();
    let user: Option<UserAuthRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    if !password_matches(&password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    let user_id = user.id;
    let resp = LoginResponse {
        token: format!("Bearer {}", token),
        user: user.into_user(),
    };

    if let Err(err) = log_audit(
        pool,
        Some(user_id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn change_password(
    pool: &DbPool,
    user: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.new_password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let row: Option<UserAuthRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    let row = match row {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };

    if !password_matches(&payload.current_password, &row.password_hash)? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }

    let password_hash = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user.user_id)
        .bind(password_hash)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "password_change",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Password changed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn password_matches(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
