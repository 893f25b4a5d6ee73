use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use joyvinco_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@joyvinco.com", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "customer@example.com", "user123", "user").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
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

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        (
            "Joyvinco Tote Bag",
            "Everyday canvas tote",
            2500,
            "https://cdn.joyvinco.com/img/tote.jpg",
        ),
        (
            "Scented Candle Set",
            "Three hand-poured candles",
            4200,
            "https://cdn.joyvinco.com/img/candles.jpg",
        ),
        (
            "Ceramic Mug",
            "Stoneware mug, 350ml",
            1200,
            "https://cdn.joyvinco.com/img/mug.jpg",
        ),
        (
            "Throw Blanket",
            "Soft knit throw",
            5500,
            "https://cdn.joyvinco.com/img/blanket.jpg",
        ),
    ];

    for (name, desc, price, image) in products {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, description, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price as i64)
        .fetch_optional(pool)
        .await?;

        if let Some((product_id,)) = row {
            sqlx::query("INSERT INTO product_images (product_id, url) VALUES ($1, $2)")
                .bind(product_id)
                .bind(image)
                .execute(pool)
                .await?;
        }
    }

    println!("Seeded products");
    Ok(())
}
