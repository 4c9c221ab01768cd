use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use askama::Template;
use tower_cookies::Cookies;

use crate::{
    error::{AppError, PageResult, Result},
    handlers::{flash_or_fail, page_context, PageContext},
    middleware::require_user,
    models::{CartLineDisplay, CheckoutForm, OrderWithItems, ShippingMethod},
    services::{cart, checkout, pricing::QuoteDisplay},
    state::AppState,
    utils::{flash_error, flash_success},
};

#[derive(Template)]
#[template(path = "shop/checkout.html")]
struct CheckoutTemplate {
    ctx: PageContext,
    lines: Vec<CartLineDisplay>,
    standard: QuoteDisplay,
    express: QuoteDisplay,
    email: String,
    full_name: String,
}

pub async fn checkout_page(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Response> {
    let user = require_user(&cookies, &state).await?;
    let lines = cart::cart_lines(&state.db, user.id).await?;

    // Catch problems before the shopper fills in the whole form.
    if let Err(e) = checkout::validate_lines(&lines) {
        return flash_or_fail(&cookies, e, "/cart");
    }

    let pricing = &state.config.pricing;
    let template = CheckoutTemplate {
        ctx: page_context(&cookies, &state, Some(&user)).await,
        standard: QuoteDisplay::from(&pricing.quote(&lines, ShippingMethod::Standard)),
        express: QuoteDisplay::from(&pricing.quote(&lines, ShippingMethod::Express)),
        lines: lines.iter().map(CartLineDisplay::from).collect(),
        email: user.email.clone(),
        full_name: user.full_name(),
    };
    Ok(Html(template.render()?).into_response())
}

pub async fn place_order(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<CheckoutForm>,
) -> PageResult<Response> {
    let user = require_user(&cookies, &state).await?;

    let details = match form.validate() {
        Ok(details) => details,
        Err(message) => {
            flash_error(&cookies, message);
            return Ok(Redirect::to("/checkout").into_response());
        }
    };

    match checkout::place_order(&state.db, &state.config.pricing, user.id, &details).await {
        Ok(placed) => {
            flash_success(
                &cookies,
                format!("Order {} placed", placed.order.order_number),
            );
            Ok(Redirect::to(&format!("/orders/{}?placed=1", placed.order.id)).into_response())
        }
        // Stock or cart problems send the shopper back to fix the cart.
        Err(e @ (AppError::EmptyCart | AppError::InsufficientStock(_))) => {
            flash_or_fail(&cookies, e, "/cart")
        }
        Err(e) => flash_or_fail(&cookies, e, "/checkout"),
    }
}

pub async fn api_checkout(
    cookies: Cookies,
    State(state): State<AppState>,
    Json(form): Json<CheckoutForm>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let user = require_user(&cookies, &state).await?;
    let details = form.validate().map_err(AppError::Validation)?;
    let placed = checkout::place_order(&state.db, &state.config.pricing, user.id, &details).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}
