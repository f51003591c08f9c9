mod common;

use storefront_api::{
    dto::auth::{ChangePasswordRequest, LoginRequest, RegisterRequest, VerifyRequest},
    middleware::auth::AuthUser,
    services::auth_service,
};

async fn issued_code(pool: &sqlx::PgPool, email: &str) -> anyhow::Result<String> {
    let row: (Option<String>,) =
        sqlx::query_as("SELECT verify_code FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(pool)
            .await?;
    Ok(row.0.expect("verification code issued at registration"))
}

#[tokio::test]
async fn register_verify_login_and_change_password() -> anyhow::Result<()> {
    let _db = common::db_guard().await;
    let state = match common::try_setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };
    // SAFETY: db_guard serializes the tests in this binary, so nothing else
    // touches the environment while this runs.
    unsafe { std::env::set_var("JWT_SECRET", "test-secret") };

    let email = "new.shopper@example.com";
    let registered = auth_service::register_user(
        &state.pool,
        RegisterRequest {
            email: email.into(),
            password: "hunter2hunter2".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(!registered.is_verified);

    // A wrong code is rejected and the account stays unverified.
    let err = auth_service::verify_user(
        &state.pool,
        VerifyRequest {
            email: email.into(),
            code: "000000x".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Invalid verification code"));

    let code = issued_code(&state.pool, email).await?;
    let verified = auth_service::verify_user(
        &state.pool,
        VerifyRequest {
            email: email.into(),
            code: code.clone(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(verified.is_verified);

    // The code is single-use.
    let err = auth_service::verify_user(
        &state.pool,
        VerifyRequest {
            email: email.into(),
            code,
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Account already verified"));

    let login = auth_service::login_user(
        &state.pool,
        LoginRequest {
            email: email.into(),
            password: "hunter2hunter2".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(login.token.starts_with("Bearer "));
    assert_eq!(login.user.email, email);

    let auth_user = AuthUser {
        user_id: login.user.id,
        role: login.user.role.clone(),
    };

    let err = auth_service::change_password(
        &state.pool,
        &auth_user,
        ChangePasswordRequest {
            current_password: "wrong-password".into(),
            new_password: "correct-horse-battery".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Current password is incorrect"));

    auth_service::change_password(
        &state.pool,
        &auth_user,
        ChangePasswordRequest {
            current_password: "hunter2hunter2".into(),
            new_password: "correct-horse-battery".into(),
        },
    )
    .await?;

    // Old password no longer works; the new one does.
    assert!(
        auth_service::login_user(
            &state.pool,
            LoginRequest {
                email: email.into(),
                password: "hunter2hunter2".into(),
            },
        )
        .await
        .is_err()
    );
    auth_service::login_user(
        &state.pool,
        LoginRequest {
            email: email.into(),
            password: "correct-horse-battery".into(),
        },
    )
    .await?;

    Ok(())
}

#[tokio::test]
async fn expired_verification_code_is_rejected() -> anyhow::Result<()> {
    let _db = common::db_guard().await;
    let state = match common::try_setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let email = "slow.shopper@example.com";
    auth_service::register_user(
        &state.pool,
        RegisterRequest {
            email: email.into(),
            password: "hunter2hunter2".into(),
        },
    )
    .await?;
    let code = issued_code(&state.pool, email).await?;

    sqlx::query(
        "UPDATE users SET verify_code_expires_at = now() - INTERVAL '1 minute' WHERE email = $1",
    )
    .bind(email)
    .execute(&state.pool)
    .await?;

    let err = auth_service::verify_user(
        &state.pool,
        VerifyRequest {
            email: email.into(),
            code,
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Verification code expired"));

    Ok(())
}
