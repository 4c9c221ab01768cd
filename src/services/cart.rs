use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, Result},
    models::{
        cart::{normalize_entries, stock_shortfalls},
        CartEntry, CartItem, CartLine, Product, StockShortfall,
    },
};

const CART_LINES_SQL: &str = r#"
    SELECT
        ci.product_id,
        p.name AS product_name,
        p.sku,
        p.price AS unit_price,
        p.stock_quantity,
        (p.is_active AND c.is_active) AS is_active,
        ci.quantity
    FROM cart_items ci
    JOIN products p ON p.id = ci.product_id
    JOIN categories c ON c.id = p.category_id
    WHERE ci.user_id = $1
    ORDER BY ci.created_at, p.name
"#;

pub async fn cart_lines<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<CartLine>>
where
    E: PgExecutor<'e>,
{
    let lines = sqlx::query_as::<_, CartLine>(CART_LINES_SQL)
        .bind(user_id)
        .fetch_all(executor)
        .await?;
    Ok(lines)
}

/// Total units in the cart, for the header badge.
pub async fn cart_count(db: &Database, user_id: Uuid) -> i64 {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart_items WHERE user_id = $1"
    )
    .bind(user_id)
    .fetch_one(db)
    .await;

    match count {
        Ok(count) => count,
        Err(e) => {
            log::error!("Failed to count cart items for user {}: {}", user_id, e);
            0
        }
    }
}

// A product in a hidden category is loaded as inactive.
const SELLABLE_PRODUCT_SQL: &str = r#"
    SELECT
        p.id, p.category_id, p.name, p.sku, p.description, p.price,
        p.stock_quantity, p.image_url,
        (p.is_active AND c.is_active) AS is_active,
        p.created_at, p.updated_at
    FROM products p
    JOIN categories c ON c.id = p.category_id
    WHERE p.id = $1
"#;

async fn load_product<'e, E>(executor: E, product_id: Uuid) -> Result<Product>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Product>(SELLABLE_PRODUCT_SQL)
        .bind(product_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
}

fn ensure_positive(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1"));
    }
    Ok(())
}

fn ensure_available(product: &Product, wanted: i32) -> Result<()> {
    let available = if product.is_active { product.stock_quantity } else { 0 };
    if wanted > available {
        return Err(AppError::InsufficientStock(vec![StockShortfall {
            product_id: product.id,
            product_name: product.name.clone(),
            requested: wanted,
            available,
        }]));
    }
    Ok(())
}

/// Adds `quantity` units, merging with any existing line. The merged quantity must fit current stock.
pub async fn add_item(
    db: &Database,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<CartItem> {
    ensure_positive(quantity)?;

    let mut tx = db.begin().await?;
    let product = load_product(&mut *tx, product_id).await?;
    if !product.is_active {
        return Err(AppError::not_found("Product"));
    }

    let existing = sqlx::query_scalar::<_, i32>(
        "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2"
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(0);

    ensure_available(&product, existing.saturating_add(quantity))?;

    let item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(item)
}

/// Sets a line to an exact quantity; zero removes it.
pub async fn set_quantity(
    db: &Database,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<()> {
    if quantity < 0 {
        return Err(AppError::validation("Quantity cannot be negative"));
    }
    if quantity == 0 {
        return remove_item(db, user_id, product_id).await;
    }

    let product = load_product(db, product_id).await?;
    ensure_available(&product, quantity)?;

    let updated = sqlx::query(
        "UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE user_id = $1 AND product_id = $2"
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .execute(db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::not_found("Cart item"));
    }
    Ok(())
}

pub async fn remove_item(db: &Database, user_id: Uuid, product_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn clear(db: &Database, user_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Replaces the whole cart. Either every entry fits current stock and the cart
/// is swapped atomically, or nothing changes.
pub async fn replace_cart(
    db: &Database,
    user_id: Uuid,
    entries: Vec<CartEntry>,
) -> Result<Vec<CartLine>> {
    let entries = normalize_entries(entries);

    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    for entry in &entries {
        let product = load_product(&mut *tx, entry.product_id).await?;
        if !product.is_active {
            return Err(AppError::not_found("Product"));
        }
        sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(entry.product_id)
            .bind(entry.quantity)
            .execute(&mut *tx)
            .await?;
    }

    let lines = cart_lines(&mut *tx, user_id).await?;
    let shortfalls = stock_shortfalls(&lines);
    if !shortfalls.is_empty() {
        return Err(AppError::InsufficientStock(shortfalls));
    }

    tx.commit().await?;
    Ok(lines)
}
