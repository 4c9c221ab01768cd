use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware::{require_admin, require_user},
    models::{Category, Order, OrderWithItems, ProductListing, User, UserResponse},
    services::{
        catalog::{self, CatalogPage, CatalogQuery},
        orders,
    },
    state::AppState,
};

#[derive(Serialize)]
pub struct ProductPageResponse {
    pub products: Vec<ProductListing>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
}

impl From<CatalogPage> for ProductPageResponse {
    fn from(page: CatalogPage) -> Self {
        Self {
            products: page.products,
            page: page.page,
            total_pages: page.total_pages,
            total: page.total,
        }
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ProductPageResponse>> {
    let page = catalog::list_products(&state.db, &query, true).await?;
    Ok(Json(page.into()))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductListing>> {
    let product = catalog::find_listing(&state.db, product_id, true).await?;
    Ok(Json(product))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = catalog::list_categories(&state.db, true).await?;
    Ok(Json(categories))
}

pub async fn list_orders(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>> {
    let user = require_user(&cookies, &state).await?;
    let orders = orders::orders_for_user(&state.db, user.id).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderWithItems>> {
    let user = require_user(&cookies, &state).await?;
    let order = orders::order_for_viewer(&state.db, &user, order_id).await?;
    Ok(Json(order))
}

pub async fn me(cookies: Cookies, State(state): State<AppState>) -> Result<Json<UserResponse>> {
    let current = require_user(&cookies, &state).await?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(current.id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(user.into()))
}

pub async fn get_user(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>> {
    require_admin(&cookies, &state).await?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(user.into()))
}
