use axum::{
    extract::{Form, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::{AppError, PageResult},
    handlers::{flash_or_fail, page_context, PageContext},
    middleware::require_admin,
    models::{OrderDisplay, OrderItemDisplay, OrderStatus, PaymentStatus},
    services::orders,
    state::AppState,
    utils::flash_success,
};

#[derive(Template)]
#[template(path = "admin/orders.html")]
struct OrdersTemplate {
    ctx: PageContext,
    statuses: Vec<String>,
    selected_status: String,
    orders: Vec<OrderDisplay>,
}

#[derive(Template)]
#[template(path = "admin/order.html")]
struct OrderTemplate {
    ctx: PageContext,
    order: OrderDisplay,
    items: Vec<OrderItemDisplay>,
    next_statuses: Vec<String>,
    payment_statuses: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub status: String,
}

/// Either select on the order screen posts here; whichever field is present gets applied.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

pub async fn orders_list(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> PageResult<Html<String>> {
    let admin = require_admin(&cookies, &state).await?;
    let status = filter.status.parse::<OrderStatus>().ok();
    let orders = orders::all_orders(&state.db, status).await?;

    let template = OrdersTemplate {
        ctx: page_context(&cookies, &state, Some(&admin)).await,
        statuses: OrderStatus::ALL.iter().map(|s| s.to_string()).collect(),
        selected_status: status.map(|s| s.to_string()).unwrap_or_default(),
        orders: orders.iter().map(OrderDisplay::from).collect(),
    };
    Ok(Html(template.render()?))
}

pub async fn order_detail(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> PageResult<Html<String>> {
    let admin = require_admin(&cookies, &state).await?;
    let placed = orders::order_for_viewer(&state.db, &admin, order_id).await?;

    let template = OrderTemplate {
        ctx: page_context(&cookies, &state, Some(&admin)).await,
        order: OrderDisplay::from(&placed.order),
        items: placed.items.iter().map(OrderItemDisplay::from).collect(),
        next_statuses: placed
            .order
            .status
            .next_statuses()
            .iter()
            .map(|s| s.to_string())
            .collect(),
        payment_statuses: PaymentStatus::ALL.iter().map(|s| s.to_string()).collect(),
    };
    Ok(Html(template.render()?))
}

pub async fn update_status(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Form(form): Form<StatusForm>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    let back = format!("/admin/orders/{}", order_id);

    let result = match (form.status.as_deref(), form.payment_status.as_deref()) {
        (Some(status), _) => match status.parse::<OrderStatus>() {
            Ok(next) => orders::change_status(&state.db, order_id, next)
                .await
                .map(|order| format!("Order {} is now {}", order.order_number, order.status)),
            Err(message) => Err(AppError::Validation(message)),
        },
        (None, Some(payment)) => match payment.parse::<PaymentStatus>() {
            Ok(next) => orders::set_payment_status(&state.db, order_id, next)
                .await
                .map(|order| {
                    format!("Order {} payment is now {}", order.order_number, order.payment_status)
                }),
            Err(message) => Err(AppError::Validation(message)),
        },
        (None, None) => Err(AppError::validation("Choose a status to apply")),
    };

    match result {
        Ok(message) => {
            log::info!("Admin {}: {}", admin.email, message);
            flash_success(&cookies, message);
            Ok(Redirect::to(&back).into_response())
        }
        Err(e) => flash_or_fail(&cookies, e, &back),
    }
}
