use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use sqlx::PgPool;
use unified_cart_api::{
    config::AppConfig,
    db::{MIGRATIONS_DIR, create_orm_conn, run_migrations},
    middleware::auth::Claims,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm, MIGRATIONS_DIR).await?;
    let pool = orm.get_postgres_connection_pool();

    seed_products(pool).await?;
    let recipe_id = seed_recipe(pool, "Soupe de légumes", &[("Carrot", 3), ("Leek", 2)]).await?;
    let bundle_id = seed_bundle(pool, "Weekly Basics", 2500, &[("Milk", 2), ("Eggs", 1)]).await?;

    println!("Seeded recipe {recipe_id} and bundle {bundle_id}");

    // No login endpoint: print tokens for local testing.
    let user_token = issue_token(&config.jwt_secret, Uuid::new_v4(), "user")?;
    let admin_token = issue_token(&config.jwt_secret, Uuid::new_v4(), "admin")?;
    println!("User token: {user_token}");
    println!("Admin token: {admin_token}");
    Ok(())
}

fn issue_token(secret: &str, user_id: Uuid, role: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::days(7)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

async fn seed_products(pool: &PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("Carrot", "Organic carrots", 200, "kg", "vegetables"),
        ("Leek", "Fresh leeks", 350, "piece", "vegetables"),
        ("Tomato", "Vine tomatoes", 300, "kg", "vegetables"),
        ("Milk", "Whole milk", 120, "litre", "dairy"),
        ("Eggs", "Free range, box of 12", 450, "box", "dairy"),
        ("Bread", "Country loaf", 280, "piece", "bakery"),
    ];

    for (name, desc, price, unit, category) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, unit, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price as i64)
        .bind(unit)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn product_id(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as("SELECT id FROM products WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

async fn seed_recipe(pool: &PgPool, title: &str, ingredients: &[(&str, i32)]) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes WHERE title = $1")
        .bind(title)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let recipe_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT INTO recipes (id, title) VALUES ($1, $2)")
        .bind(recipe_id)
        .bind(title)
        .execute(&mut *tx)
        .await?;
    for (position, (name, quantity)) in ingredients.iter().enumerate() {
        let product = product_id(pool, name).await?;
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (id, recipe_id, product_id, quantity, position)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recipe_id)
        .bind(product)
        .bind(quantity)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(recipe_id)
}

async fn seed_bundle(
    pool: &PgPool,
    name: &str,
    total_price: i64,
    items: &[(&str, i32)],
) -> anyhow::Result<Uuid> {
    let mut contents = Vec::with_capacity(items.len());
    for (product, quantity) in items {
        contents.push(serde_json::json!({
            "productId": product_id(pool, product).await?,
            "quantity": quantity,
        }));
    }

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO preconfigured_carts (id, name, total_price, items)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (name) DO UPDATE SET total_price = EXCLUDED.total_price
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(total_price)
    .bind(serde_json::Value::Array(contents))
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
