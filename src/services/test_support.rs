//! Row builders shared by the database-backed service tests.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    middleware::CurrentUser,
    models::{
        order::{Address, PaymentMethod},
        CheckoutDetails, ShippingMethod, User,
    },
};

pub async fn create_user(pool: &PgPool, email: &str) -> CurrentUser {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name)
        VALUES ($1, 'not-a-real-hash', 'Test', 'Shopper')
        RETURNING *
        "#,
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap();
    CurrentUser::from_user(user, Uuid::new_v4())
}

pub async fn create_category(pool: &PgPool, name: &str, active: bool) -> Uuid {
    sqlx::query_scalar::<_, Uuid>("INSERT INTO categories (name, is_active) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(active)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn create_product(pool: &PgPool, category_id: Uuid, sku: &str, price: Decimal, stock: i32) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO products (category_id, name, sku, price, stock_quantity)
        VALUES ($1, $2, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(category_id)
    .bind(sku)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Writes a cart line directly, skipping the stock checks `add_item` makes.
pub async fn put_in_cart(pool: &PgPool, user_id: Uuid, product_id: Uuid, quantity: i32) {
    sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
    sqlx::query_scalar::<_, i32>("SELECT stock_quantity FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn cart_quantity(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Option<i32> {
    sqlx::query_scalar::<_, i32>("SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(pool)
        .await
        .unwrap()
}

pub async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

pub fn checkout_details(email: &str) -> CheckoutDetails {
    let address = Address {
        name: "Test Shopper".to_string(),
        line1: "1 Market Street".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        state: None,
        postal_code: "12345".to_string(),
        country: "US".to_string(),
    };
    CheckoutDetails {
        contact_email: email.to_string(),
        contact_phone: None,
        shipping: address.clone(),
        billing: address,
        shipping_method: ShippingMethod::Standard,
        payment_method: PaymentMethod::CashOnDelivery,
        notes: None,
    }
}
