use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::error::AppError;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_FIELD: &str = "csrf_token";

const MAX_FORM_BYTES: usize = 1024 * 1024;

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Returns the request's CSRF token, issuing a fresh cookie if there isn't one yet.
pub fn csrf_token(cookies: &Cookies) -> String {
    if let Some(existing) = cookies.get(CSRF_COOKIE) {
        if !existing.value().is_empty() {
            return existing.value().to_string();
        }
    }
    let token = generate_token();
    let cookie = Cookie::build((CSRF_COOKIE, token.clone()))
        .path("/")
        .same_site(tower_cookies::cookie::SameSite::Strict)
        .build();
    cookies.add(cookie);
    token
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Pulls `csrf_token` out of an urlencoded form body.
fn token_from_form(body: &[u8]) -> Option<String> {
    let body = std::str::from_utf8(body).ok()?;
    body.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key != CSRF_FIELD {
            return None;
        }
        urlencoding::decode(&value.replace('+', " "))
            .ok()
            .map(|v| v.into_owned())
    })
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Double-submit check: unsafe requests must echo the `csrf_token` cookie
/// in the `X-CSRF-Token` header or in a `csrf_token` form field.
pub async fn csrf_protect(cookies: Cookies, request: Request, next: Next) -> Response {
    let expected = csrf_token(&cookies);

    if is_safe(request.method()) {
        return next.run(request).await;
    }

    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (presented, request) = match header_token {
        Some(token) => (Some(token), request),
        None if is_form(&request) => {
            let (parts, body) = request.into_parts();
            let bytes = match to_bytes(body, MAX_FORM_BYTES).await {
                Ok(bytes) => bytes,
                Err(_) => return AppError::validation("Request body too large").into_response(),
            };
            let token = token_from_form(&bytes);
            (token, Request::from_parts(parts, Body::from(bytes)))
        }
        None => (None, request),
    };

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            log::warn!("Rejected {} {} without a valid CSRF token", request.method(), request.uri().path());
            AppError::Csrf.into_response()
        }
    }
}
