pub mod admin;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod shop;

use axum::response::{IntoResponse, Redirect, Response};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, PageResult},
    middleware::{csrf_token, CurrentUser},
    services,
    state::AppState,
    utils::{flash_error, take_flash},
};

/// Values every page layout needs: who is signed in, the CSRF token and any flash message.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub signed_in: bool,
    pub is_admin: bool,
    pub user_name: String,
    pub csrf_token: String,
    pub cart_count: i64,
    pub flash_message: String,
    pub flash_kind: String,
}

pub async fn page_context(
    cookies: &Cookies,
    state: &AppState,
    user: Option<&CurrentUser>,
) -> PageContext {
    let flash = take_flash(cookies);
    let cart_count = match user {
        Some(user) => services::cart::cart_count(&state.db, user.id).await,
        None => 0,
    };

    PageContext {
        signed_in: user.is_some(),
        is_admin: user.map(|u| u.is_admin).unwrap_or(false),
        user_name: user.map(CurrentUser::full_name).unwrap_or_default(),
        csrf_token: csrf_token(cookies),
        cart_count,
        flash_message: flash.as_ref().map(|f| f.message.clone()).unwrap_or_default(),
        flash_kind: flash.map(|f| f.kind.as_str().to_string()).unwrap_or_default(),
    }
}

/// Shows a shopper-facing failure as a flash message on the page at `to`.
/// Anything else (sign-in, permissions, server faults) goes through the error page.
pub fn flash_or_fail(cookies: &Cookies, err: AppError, to: &str) -> PageResult<Response> {
    match err {
        AppError::Validation(_)
        | AppError::EmptyCart
        | AppError::InsufficientStock(_)
        | AppError::Conflict(_)
        | AppError::NotFound(_) => {
            flash_error(cookies, err.user_message());
            Ok(Redirect::to(to).into_response())
        }
        other => Err(other.into()),
    }
}

pub async fn health() -> &'static str {
    "ok"
}
