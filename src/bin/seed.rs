use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use sqlx::types::Json;
use storefront_api::{
    config::AppConfig,
    db::create_pool,
    models::{OptionChoice, OptionField, OptionSchema},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user_with_role(&pool, "admin@example.com", "admin123!", "admin").await?;
    let user_id = ensure_user_with_role(&pool, "user@example.com", "user1234", "user").await?;
    seed_catalog(&pool).await?;
    seed_coupon(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role, is_verified)
        VALUES ($1, $2, $3, $4, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let apparel_id = ensure_category(pool, "Apparel", Some("Shirts, hoodies and caps")).await?;
    let gifts_id = ensure_category(pool, "Personalized Gifts", Some("Made to order")).await?;

    let tee_options = OptionSchema::Apparel {
        sizes: vec![
            OptionChoice {
                label: "S".into(),
                price_delta: 0,
            },
            OptionChoice {
                label: "M".into(),
                price_delta: 0,
            },
            OptionChoice {
                label: "L".into(),
                price_delta: 0,
            },
            OptionChoice {
                label: "XL".into(),
                price_delta: 200,
            },
        ],
        colors: vec![
            OptionChoice {
                label: "black".into(),
                price_delta: 0,
            },
            OptionChoice {
                label: "white".into(),
                price_delta: 0,
            },
        ],
    };
    ensure_product(pool, apparel_id, "Classic Tee", 1_900, tee_options).await?;

    let tumbler_options = OptionSchema::Personalized {
        fields: vec![OptionField {
            name: "engraving_font".into(),
            required: false,
            choices: vec![
                OptionChoice {
                    label: "serif".into(),
                    price_delta: 300,
                },
                OptionChoice {
                    label: "script".into(),
                    price_delta: 500,
                },
            ],
        }],
    };
    ensure_product(pool, gifts_id, "Engraved Tumbler", 2_400, tumbler_options).await?;
    ensure_product(pool, gifts_id, "Gift Card Sleeve", 600, OptionSchema::Standard).await?;

    Ok(())
}

async fn ensure_category(
    pool: &sqlx::PgPool,
    name: &str,
    description: Option<&str>,
) -> anyhow::Result<i64> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }
    let row: (i64,) =
        sqlx::query_as("INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(description)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

async fn ensure_product(
    pool: &sqlx::PgPool,
    category_id: i64,
    name: &str,
    price: i64,
    options: OptionSchema,
) -> anyhow::Result<()> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO products (category_id, name, price, options) VALUES ($1, $2, $3, $4)",
    )
    .bind(category_id)
    .bind(name)
    .bind(price)
    .bind(Json(options))
    .execute(pool)
    .await?;
    Ok(())
}

async fn seed_coupon(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM coupons WHERE code = $1")
        .bind("WELCOME10")
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO coupons (id, code, discount_type, discount_value, min_order_amount, max_usage)
        VALUES ($1, 'WELCOME10', 'percentage', 10, 2000, 100)
        "#,
    )
    .bind(Uuid::new_v4())
    .execute(pool)
    .await?;
    Ok(())
}
