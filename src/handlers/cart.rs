use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use askama::Template;
use rust_decimal::Decimal;
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    config::PricingConfig,
    error::{PageResult, Result},
    filters,
    handlers::{flash_or_fail, page_context, PageContext},
    middleware::require_user,
    models::{
        AddToCartForm, CartItem, CartLine, CartLineDisplay, SaveCartRequest, ShippingMethod,
        UpdateCartForm,
    },
    services::{
        cart,
        pricing::{Quote, QuoteDisplay},
    },
    state::AppState,
    utils::flash_success,
};

#[derive(Template)]
#[template(path = "shop/cart.html")]
struct CartTemplate {
    ctx: PageContext,
    lines: Vec<CartLineDisplay>,
    quote: QuoteDisplay,
    free_shipping_gap: Decimal,
}

/// Cart contents as returned by the JSON API.
#[derive(Debug, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartSummaryLine>,
    pub item_count: i64,
    pub quote: Quote,
}

#[derive(Debug, Serialize)]
pub struct CartSummaryLine {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total: Decimal,
    pub available: i32,
}

impl CartSummary {
    fn build(lines: Vec<CartLine>, pricing: &PricingConfig) -> Self {
        let quote = pricing.quote(&lines, ShippingMethod::Standard);
        let item_count = lines.iter().map(|l| i64::from(l.quantity)).sum();
        let items = lines
            .into_iter()
            .map(|line| CartSummaryLine {
                line_total: line.line_total(),
                available: line.available(),
                line,
            })
            .collect();
        Self {
            items,
            item_count,
            quote,
        }
    }
}

pub async fn cart_page(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Html<String>> {
    let user = require_user(&cookies, &state).await?;
    let lines = cart::cart_lines(&state.db, user.id).await?;

    let pricing = &state.config.pricing;
    let quote = pricing.quote(&lines, ShippingMethod::Standard);

    let template = CartTemplate {
        ctx: page_context(&cookies, &state, Some(&user)).await,
        lines: lines.iter().map(CartLineDisplay::from).collect(),
        free_shipping_gap: pricing.free_shipping_gap(quote.subtotal),
        quote: QuoteDisplay::from(&quote),
    };
    Ok(Html(template.render()?))
}

pub async fn add_to_cart(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<AddToCartForm>,
) -> PageResult<Response> {
    let user = require_user(&cookies, &state).await?;

    match cart::add_item(&state.db, user.id, form.product_id, form.quantity).await {
        Ok(_) => {
            flash_success(&cookies, "Added to your cart");
            Ok(Redirect::to("/cart").into_response())
        }
        Err(e) => flash_or_fail(&cookies, e, &format!("/products/{}", form.product_id)),
    }
}

pub async fn update_cart(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<UpdateCartForm>,
) -> PageResult<Response> {
    let user = require_user(&cookies, &state).await?;

    match cart::set_quantity(&state.db, user.id, form.product_id, form.quantity).await {
        Ok(()) => {
            flash_success(&cookies, "Cart updated");
            Ok(Redirect::to("/cart").into_response())
        }
        Err(e) => flash_or_fail(&cookies, e, "/cart"),
    }
}

pub async fn remove_from_cart(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> PageResult<Response> {
    let user = require_user(&cookies, &state).await?;
    cart::remove_item(&state.db, user.id, product_id).await?;
    flash_success(&cookies, "Item removed");
    Ok(Redirect::to("/cart").into_response())
}

pub async fn clear_cart(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Response> {
    let user = require_user(&cookies, &state).await?;
    cart::clear(&state.db, user.id).await?;
    flash_success(&cookies, "Your cart is now empty");
    Ok(Redirect::to("/cart").into_response())
}

pub async fn api_get_cart(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Json<CartSummary>> {
    let user = require_user(&cookies, &state).await?;
    let lines = cart::cart_lines(&state.db, user.id).await?;
    Ok(Json(CartSummary::build(lines, &state.config.pricing)))
}

pub async fn api_add_to_cart(
    cookies: Cookies,
    State(state): State<AppState>,
    Json(request): Json<AddToCartForm>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let user = require_user(&cookies, &state).await?;
    let item = cart::add_item(&state.db, user.id, request.product_id, request.quantity).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

// Replaces the whole cart in one go; nothing changes if any line is short on stock
pub async fn api_save_cart(
    cookies: Cookies,
    State(state): State<AppState>,
    Json(request): Json<SaveCartRequest>,
) -> Result<Json<CartSummary>> {
    let user = require_user(&cookies, &state).await?;
    let lines = cart::replace_cart(&state.db, user.id, request.items).await?;
    log::info!("User {} saved cart with {} lines", user.email, lines.len());
    Ok(Json(CartSummary::build(lines, &state.config.pricing)))
}
