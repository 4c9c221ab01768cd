use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, Result},
    middleware::CurrentUser,
    models::{Order, OrderItem, OrderStatus, OrderWithItems, PaymentStatus},
};

pub async fn find_order(db: &Database, order_id: Uuid) -> Result<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

pub async fn order_items(db: &Database, order_id: Uuid) -> Result<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name"
    )
    .bind(order_id)
    .fetch_all(db)
    .await?;
    Ok(items)
}

/// Loads an order the viewer may see: their own, or any order for admins.
/// Other people's orders look missing rather than forbidden.
pub async fn order_for_viewer(
    db: &Database,
    viewer: &CurrentUser,
    order_id: Uuid,
) -> Result<OrderWithItems> {
    let order = find_order(db, order_id).await?;
    if order.user_id != viewer.id && !viewer.is_admin {
        return Err(AppError::not_found("Order"));
    }
    let items = order_items(db, order.id).await?;
    Ok(OrderWithItems { order, items })
}

pub async fn orders_for_user(db: &Database, user_id: Uuid) -> Result<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(orders)
}

pub async fn all_orders(db: &Database, status: Option<OrderStatus>) -> Result<Vec<Order>> {
    let mut query = sqlx::QueryBuilder::<sqlx::Postgres>::new("SELECT * FROM orders");
    if let Some(status) = status {
        query.push(" WHERE status = ").push_bind(status);
    }
    query.push(" ORDER BY created_at DESC");

    let orders = query.build_query_as::<Order>().fetch_all(db).await?;
    Ok(orders)
}

async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> Result<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

// Expects `order` to be locked by the caller's transaction.
async fn apply_transition(conn: &mut PgConnection, order: &Order, next: OrderStatus) -> Result<Order> {
    if !order.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Order {} cannot move from {} to {}",
            order.order_number, order.status, next
        )));
    }

    if next == OrderStatus::Cancelled {
        sqlx::query(
            r#"
            UPDATE products p
            SET stock_quantity = p.stock_quantity + oi.quantity, updated_at = NOW()
            FROM order_items oi
            WHERE oi.order_id = $1 AND oi.product_id = p.id
            "#,
        )
        .bind(order.id)
        .execute(&mut *conn)
        .await?;
    }

    let updated = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *"
    )
    .bind(next)
    .bind(order.id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(updated)
}

/// Moves an order along its lifecycle. Cancelling puts the stock back for
/// every line whose product still exists.
pub async fn change_status(db: &Database, order_id: Uuid, next: OrderStatus) -> Result<Order> {
    let mut tx = db.begin().await?;
    let order = lock_order(&mut *tx, order_id).await?;
    let updated = apply_transition(&mut *tx, &order, next).await?;
    tx.commit().await?;

    log::info!("Order {} moved from {} to {}", updated.order_number, order.status, next);
    Ok(updated)
}

/// Customers may only cancel their own orders, and only while pending.
/// Both checks run against the row locked for the update.
pub async fn cancel_own_order(db: &Database, user: &CurrentUser, order_id: Uuid) -> Result<Order> {
    let mut tx = db.begin().await?;
    let order = lock_order(&mut *tx, order_id).await?;
    if order.user_id != user.id {
        return Err(AppError::not_found("Order"));
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(
            "Only pending orders can be cancelled".to_string(),
        ));
    }
    let updated = apply_transition(&mut *tx, &order, OrderStatus::Cancelled).await?;
    tx.commit().await?;

    log::info!("Order {} cancelled by its customer {}", updated.order_number, user.email);
    Ok(updated)
}

pub async fn set_payment_status(
    db: &Database,
    order_id: Uuid,
    payment_status: PaymentStatus,
) -> Result<Order> {
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET payment_status = $1, updated_at = NOW() WHERE id = $2 RETURNING *"
    )
    .bind(payment_status)
    .bind(order_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found("Order"))?;

    log::info!("Order {} payment status set to {}", order.order_number, payment_status);
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PricingConfig,
        services::{checkout::place_order, test_support::*},
    };
    use rust_decimal::Decimal;
    use sqlx::PgPool;
    use std::time::Duration;

    // One pending order for three units of a product that had ten.
    async fn pending_order(pool: &PgPool) -> (CurrentUser, Uuid, Order) {
        let user = create_user(pool, "shopper@example.com").await;
        let category = create_category(pool, "Kitchen", true).await;
        let product = create_product(pool, category, "MUG-1", Decimal::new(650, 2), 10).await;
        put_in_cart(pool, user.id, product, 3).await;
        let placed = place_order(pool, &PricingConfig::default(), user.id, &checkout_details(&user.email))
            .await
            .unwrap();
        (user, product, placed.order)
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn customer_cancel_restocks(pool: PgPool) {
        let (user, product, order) = pending_order(&pool).await;
        assert_eq!(stock_of(&pool, product).await, 7);

        let cancelled = cancel_own_order(&pool, &user, order.id).await.unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&pool, product).await, 10);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn other_customers_see_no_order_to_cancel(pool: PgPool) {
        let (_, product, order) = pending_order(&pool).await;
        let stranger = create_user(&pool, "stranger@example.com").await;

        let result = cancel_own_order(&pool, &stranger, order.id).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(find_order(&pool, order.id).await.unwrap().status, OrderStatus::Pending);
        assert_eq!(stock_of(&pool, product).await, 7);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn processing_orders_stay_with_the_customer(pool: PgPool) {
        let (user, product, order) = pending_order(&pool).await;
        change_status(&pool, order.id, OrderStatus::Processing).await.unwrap();

        let result = cancel_own_order(&pool, &user, order.id).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(find_order(&pool, order.id).await.unwrap().status, OrderStatus::Processing);
        assert_eq!(stock_of(&pool, product).await, 7);
    }

    // An admin holds the order row and moves it to processing while the
    // customer's cancel is waiting; the cancel must see the new status.
    #[sqlx::test(migrations = "./migrations")]
    async fn cancel_racing_an_admin_update_is_refused(pool: PgPool) {
        let (user, product, order) = pending_order(&pool).await;

        let mut admin_tx = pool.begin().await.unwrap();
        sqlx::query("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order.id)
            .execute(&mut *admin_tx)
            .await
            .unwrap();

        let cancel = tokio::spawn({
            let pool = pool.clone();
            let user = user.clone();
            async move { cancel_own_order(&pool, &user, order.id).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        sqlx::query("UPDATE orders SET status = 'processing' WHERE id = $1")
            .bind(order.id)
            .execute(&mut *admin_tx)
            .await
            .unwrap();
        admin_tx.commit().await.unwrap();

        let result = cancel.await.unwrap();
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(find_order(&pool, order.id).await.unwrap().status, OrderStatus::Processing);
        assert_eq!(stock_of(&pool, product).await, 7);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn shipped_orders_cannot_be_cancelled_by_admins(pool: PgPool) {
        let (_, product, order) = pending_order(&pool).await;
        change_status(&pool, order.id, OrderStatus::Processing).await.unwrap();
        change_status(&pool, order.id, OrderStatus::Shipped).await.unwrap();

        let result = change_status(&pool, order.id, OrderStatus::Cancelled).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(stock_of(&pool, product).await, 7);
    }
}
