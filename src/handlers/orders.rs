use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::PageResult,
    handlers::{flash_or_fail, page_context, PageContext},
    middleware::require_user,
    models::{OrderDisplay, OrderItemDisplay},
    services::orders,
    state::AppState,
    utils::flash_success,
};

#[derive(Template)]
#[template(path = "shop/orders.html")]
struct OrdersTemplate {
    ctx: PageContext,
    orders: Vec<OrderDisplay>,
}

#[derive(Template)]
#[template(path = "shop/order.html")]
struct OrderTemplate {
    ctx: PageContext,
    order: OrderDisplay,
    items: Vec<OrderItemDisplay>,
    just_placed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub placed: Option<u8>,
}

// Order history for the signed-in shopper, newest first
pub async fn orders_list(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Html<String>> {
    let user = require_user(&cookies, &state).await?;
    let orders = orders::orders_for_user(&state.db, user.id).await?;

    let template = OrdersTemplate {
        ctx: page_context(&cookies, &state, Some(&user)).await,
        orders: orders.iter().map(OrderDisplay::from).collect(),
    };
    Ok(Html(template.render()?))
}

pub async fn order_detail(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<OrderQuery>,
) -> PageResult<Html<String>> {
    let user = require_user(&cookies, &state).await?;
    let placed = orders::order_for_viewer(&state.db, &user, order_id).await?;

    let mut order = OrderDisplay::from(&placed.order);
    // Only the owner cancels from the storefront; admins use the order screen.
    order.can_cancel = order.can_cancel && placed.order.user_id == user.id;

    let template = OrderTemplate {
        ctx: page_context(&cookies, &state, Some(&user)).await,
        order,
        items: placed.items.iter().map(OrderItemDisplay::from).collect(),
        just_placed: query.placed.is_some(),
    };
    Ok(Html(template.render()?))
}

pub async fn cancel_order(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> PageResult<Response> {
    let user = require_user(&cookies, &state).await?;
    let back = format!("/orders/{}", order_id);

    match orders::cancel_own_order(&state.db, &user, order_id).await {
        Ok(order) => {
            flash_success(&cookies, format!("Order {} cancelled", order.order_number));
            Ok(Redirect::to(&back).into_response())
        }
        Err(e) => flash_or_fail(&cookies, e, &back),
    }
}
