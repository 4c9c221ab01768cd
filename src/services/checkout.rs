//! Turns a user's cart into an order.
//!
//! Everything happens inside one database transaction: the cart is re-read
//! against live product rows, stock is validated, the order and its line item
//! snapshots are written, stock is decremented and the cart is emptied. Any
//! error drops the transaction, which rolls it back.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::PricingConfig,
    database::Database,
    error::{AppError, Result},
    models::{
        cart::stock_shortfalls, order::generate_order_number, CartLine, CheckoutDetails, Order,
        OrderItem, OrderWithItems, StockShortfall,
    },
    services::cart::cart_lines,
};

/// Fails with the full list of short lines if any cannot be fulfilled.
pub fn validate_lines(lines: &[CartLine]) -> Result<()> {
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }
    let shortfalls = stock_shortfalls(lines);
    if !shortfalls.is_empty() {
        return Err(AppError::InsufficientStock(shortfalls));
    }
    Ok(())
}

pub async fn place_order(
    db: &Database,
    pricing: &PricingConfig,
    user_id: Uuid,
    details: &CheckoutDetails,
) -> Result<OrderWithItems> {
    let mut tx = db.begin().await?;

    let lines = cart_lines(&mut *tx, user_id).await?;
    validate_lines(&lines)?;

    let quote = pricing.quote(&lines, details.shipping_method);
    let order_number = generate_order_number(Utc::now());

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (
            order_number, user_id, payment_method, shipping_method,
            subtotal, tax_amount, shipping_amount, total_amount,
            contact_email, contact_phone,
            shipping_name, shipping_address_line1, shipping_address_line2, shipping_city,
            shipping_state, shipping_postal_code, shipping_country,
            billing_name, billing_address_line1, billing_address_line2, billing_city,
            billing_state, billing_postal_code, billing_country,
            notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $25)
        RETURNING *
        "#,
    )
    .bind(&order_number)
    .bind(user_id)
    .bind(details.payment_method.as_str())
    .bind(details.shipping_method.as_str())
    .bind(quote.subtotal)
    .bind(quote.tax)
    .bind(quote.shipping)
    .bind(quote.total)
    .bind(&details.contact_email)
    .bind(&details.contact_phone)
    .bind(&details.shipping.name)
    .bind(&details.shipping.line1)
    .bind(&details.shipping.line2)
    .bind(&details.shipping.city)
    .bind(&details.shipping.state)
    .bind(&details.shipping.postal_code)
    .bind(&details.shipping.country)
    .bind(&details.billing.name)
    .bind(&details.billing.line1)
    .bind(&details.billing.line2)
    .bind(&details.billing.city)
    .bind(&details.billing.state)
    .bind(&details.billing.postal_code)
    .bind(&details.billing.country)
    .bind(&details.notes)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items (order_id, product_id, product_name, product_sku, unit_price, quantity, line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.sku)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(line.line_total())
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);

        // Guarded so a concurrent checkout that already took the stock makes this one fail.
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $1, updated_at = NOW()
            WHERE id = $2 AND stock_quantity >= $1
            "#,
        )
        .bind(line.quantity)
        .bind(line.product_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            let available = sqlx::query_scalar::<_, i32>("SELECT stock_quantity FROM products WHERE id = $1")
                .bind(line.product_id)
                .fetch_optional(&mut *tx)
                .await?
                .unwrap_or(0);
            return Err(AppError::InsufficientStock(vec![StockShortfall {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                requested: line.quantity,
                available,
            }]));
        }
    }

    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!(
        "Order {} placed by user {}: {} line(s), total {}",
        order.order_number,
        user_id,
        items.len(),
        order.total_amount
    );

    Ok(OrderWithItems { order, items })
}
