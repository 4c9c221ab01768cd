use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::StockShortfall;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Please sign in to continue")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("You do not have permission to do that")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("{}", describe_shortfalls(.0))]
    InsufficientStock(Vec<StockShortfall>),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid or missing CSRF token")]
    Csrf,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

fn describe_shortfalls(shortfalls: &[StockShortfall]) -> String {
    let items: Vec<String> = shortfalls
        .iter()
        .map(|s| format!("{} (requested {}, available {})", s.product_name, s.requested, s.available))
        .collect();
    format!("Not enough stock for: {}", items.join(", "))
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(what.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Maps constraint violations raised by a write into user-facing conflicts.
    pub fn from_write(err: sqlx::Error, conflict_message: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                return AppError::Conflict(conflict_message.to_string());
            }
        }
        AppError::Database(err)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::EmptyCart => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::Csrf => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientStock(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Template(_)
            | AppError::Token(_)
            | AppError::Password(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message safe to show a shopper. Server-side failures collapse to a generic text.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => "Record not found".to_string(),
            _ if self.status().is_server_error() => {
                "Something went wrong on our side. Please try again.".to_string()
            }
            _ => self.to_string(),
        }
    }

    fn log(&self) {
        if self.status().is_server_error() {
            log::error!("{}", self);
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        let body = match &self {
            AppError::InsufficientStock(shortfalls) => json!({
                "error": self.user_message(),
                "details": shortfalls,
            }),
            _ => json!({ "error": self.user_message() }),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    status: u16,
    message: String,
}

/// Error type for handlers that render HTML pages.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl From<sqlx::Error> for PageError {
    fn from(err: sqlx::Error) -> Self {
        PageError(AppError::Database(err))
    }
}

impl From<askama::Error> for PageError {
    fn from(err: askama::Error) -> Self {
        PageError(AppError::Template(err))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let err = self.0;
        if matches!(err, AppError::Unauthorized) {
            return Redirect::to("/login").into_response();
        }

        err.log();
        let status = err.status();
        let template = ErrorTemplate {
            status: status.as_u16(),
            message: err.user_message(),
        };
        match template.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                log::error!("Failed to render error page: {}", e);
                (status, err.user_message()).into_response()
            }
        }
    }
}

pub type PageResult<T> = std::result::Result<T, PageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn maps_user_errors_to_client_statuses() {
        assert_eq!(AppError::EmptyCart.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Csrf.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("Product").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InsufficientStock(vec![]).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn hides_internal_details() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("pool"));

        let err = AppError::Internal("secret detail".to_string());
        assert!(!err.user_message().contains("secret"));
    }

    #[test]
    fn stock_errors_name_every_item() {
        let err = AppError::InsufficientStock(vec![
            StockShortfall {
                product_id: Uuid::new_v4(),
                product_name: "Mug".to_string(),
                requested: 3,
                available: 1,
            },
            StockShortfall {
                product_id: Uuid::new_v4(),
                product_name: "Kettle".to_string(),
                requested: 2,
                available: 0,
            },
        ]);
        let message = err.user_message();
        assert!(message.contains("Mug (requested 3, available 1)"));
        assert!(message.contains("Kettle (requested 2, available 0)"));
    }

    #[test]
    fn page_error_redirects_anonymous_users() {
        let response = PageError(AppError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login");
    }
}
