pub mod categories;
pub mod orders;
pub mod products;
pub mod users;

use axum::{extract::State, response::Html};
use askama::Template;
use rust_decimal::Decimal;
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::{PageResult, Result},
    filters,
    handlers::{page_context, PageContext},
    middleware::require_admin,
    models::catalog::LOW_STOCK_LEVEL,
    state::AppState,
};

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct DashboardTemplate {
    ctx: PageContext,
    product_count: i64,
    low_stock_count: i64,
    category_count: i64,
    pending_order_count: i64,
    order_count: i64,
    user_count: i64,
    revenue: Decimal,
}

async fn count(db: &Database, sql: &str) -> Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(db).await?)
}

pub async fn dashboard(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Html<String>> {
    let admin = require_admin(&cookies, &state).await?;
    let db = &state.db;

    let low_stock_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM products WHERE is_active = true AND stock_quantity <= $1"
    )
    .bind(LOW_STOCK_LEVEL)
    .fetch_one(db)
    .await?;

    // Cancelled orders never count towards revenue.
    let revenue = sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(total_amount), 0) FROM orders WHERE status <> 'cancelled'"
    )
    .fetch_one(db)
    .await?;

    let template = DashboardTemplate {
        ctx: page_context(&cookies, &state, Some(&admin)).await,
        product_count: count(db, "SELECT COUNT(*) FROM products").await?,
        low_stock_count,
        category_count: count(db, "SELECT COUNT(*) FROM categories").await?,
        pending_order_count: count(db, "SELECT COUNT(*) FROM orders WHERE status = 'pending'").await?,
        order_count: count(db, "SELECT COUNT(*) FROM orders").await?,
        user_count: count(db, "SELECT COUNT(*) FROM users").await?,
        revenue,
    };
    Ok(Html(template.render()?))
}
