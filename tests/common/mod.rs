use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Statement};
use storefront_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    entity::{
        categories::ActiveModel as CategoryActive, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    middleware::auth::{AuthUser, Shopper},
    models::OptionSchema,
    state::AppState,
};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

// Every test starts by truncating the shared database, so tests within one
// binary must not interleave.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

pub async fn db_guard() -> MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

/// Build an `AppState` against the configured test database, or `None` when
/// no database is available so callers can skip.
pub async fn try_setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs.
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, wishlist_items, reviews, coupons, audit_logs, products, categories, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(Some(AppState {
        pool,
        orm,
        delivery_fee: 500,
    }))
}

pub async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        is_verified: Set(true),
        verify_code: Set(None),
        verify_code_expires_at: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    options: &OptionSchema,
) -> anyhow::Result<i64> {
    let category = CategoryActive {
        id: NotSet,
        name: Set(format!("Category for {name}")),
        description: Set(None),
        parent_id: Set(None),
        image: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let product = ProductActive {
        id: NotSet,
        category_id: Set(Some(category.id)),
        name: Set(name.to_string()),
        description: Set(Some("A product for testing".into())),
        price: Set(price),
        image: Set(None),
        options: Set(serde_json::to_value(options)?),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}

pub fn shopper_for(user_id: Uuid, role: &str) -> Shopper {
    Shopper {
        user_id: user_id.to_string(),
        auth: Some(AuthUser {
            user_id,
            role: role.into(),
        }),
    }
}

pub fn guest_shopper() -> Shopper {
    Shopper {
        user_id: storefront_api::models::GUEST_USER_ID.to_string(),
        auth: None,
    }
}
