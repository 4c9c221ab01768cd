mod config;
mod database;
mod error;
mod filters;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod utils;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};

use config::AppConfig;
use database::{create_database_pool, run_migrations};
use error::AppError;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;

    let db = create_database_pool(&config).await?;
    run_migrations(&db).await?;

    let addr = config.bind_address();
    let app = create_router(AppState::new(db, config));

    log::info!("Storefront listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        // Storefront
        .route("/", get(handlers::shop::catalog))
        .route("/products/:id", get(handlers::shop::product_detail))
        .route("/login", get(handlers::auth::login_page).post(handlers::auth::login))
        .route("/register", get(handlers::auth::register_page).post(handlers::auth::register))
        .route("/logout", post(handlers::auth::logout))

        // Cart
        .route("/cart", get(handlers::cart::cart_page))
        .route("/cart/add", post(handlers::cart::add_to_cart))
        .route("/cart/update", post(handlers::cart::update_cart))
        .route("/cart/remove/:product_id", post(handlers::cart::remove_from_cart))
        .route("/cart/clear", post(handlers::cart::clear_cart))

        // Checkout and order history
        .route("/checkout", get(handlers::checkout::checkout_page).post(handlers::checkout::place_order))
        .route("/orders", get(handlers::orders::orders_list))
        .route("/orders/:id", get(handlers::orders::order_detail))
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))

        // Back office
        .route("/admin", get(handlers::admin::dashboard))
        .route("/admin/products", get(handlers::admin::products::products_list).post(handlers::admin::products::create_product))
        .route("/admin/products/new", get(handlers::admin::products::new_product_form))
        .route("/admin/products/:id/edit", get(handlers::admin::products::edit_product_form))
        .route("/admin/products/:id", post(handlers::admin::products::update_product))
        .route("/admin/products/:id/delete", post(handlers::admin::products::delete_product))
        .route("/admin/categories", get(handlers::admin::categories::categories_list).post(handlers::admin::categories::create_category))
        .route("/admin/categories/:id/edit", get(handlers::admin::categories::edit_category_form))
        .route("/admin/categories/:id", post(handlers::admin::categories::update_category))
        .route("/admin/categories/:id/delete", post(handlers::admin::categories::delete_category))
        .route("/admin/orders", get(handlers::admin::orders::orders_list))
        .route("/admin/orders/:id", get(handlers::admin::orders::order_detail))
        .route("/admin/orders/:id/status", post(handlers::admin::orders::update_status))
        .route("/admin/users", get(handlers::admin::users::users_list))
        .route("/admin/users/:id/edit", get(handlers::admin::users::edit_user_form))
        .route("/admin/users/:id", post(handlers::admin::users::update_user))
        .route("/admin/users/:id/delete", post(handlers::admin::users::delete_user))

        // JSON API
        .route("/api/csrf", get(handlers::auth::api_csrf))
        .route("/api/login", post(handlers::auth::api_login))
        .route("/api/logout", post(handlers::auth::api_logout))
        .route("/api/me", get(handlers::api::me))
        .route("/api/cart", get(handlers::cart::api_get_cart))
        .route("/api/cart/add", post(handlers::cart::api_add_to_cart))
        .route("/api/cart/save", post(handlers::cart::api_save_cart))
        .route("/api/checkout", post(handlers::checkout::api_checkout))
        .route("/api/products", get(handlers::api::list_products))
        .route("/api/products/:id", get(handlers::api::get_product))
        .route("/api/categories", get(handlers::api::list_categories))
        .route("/api/orders", get(handlers::api::list_orders))
        .route("/api/orders/:id", get(handlers::api::get_order))
        .route("/api/users/:id", get(handlers::api::get_user))

        .route("/health", get(handlers::health))

        // Static files
        .nest_service("/static", ServeDir::new("static"))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(2 * 1024 * 1024)) // 2MB
                .layer(from_fn(middleware::csrf_protect))
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // The pool never connects: these requests are all answered before any query runs.
    fn test_app() -> Router {
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/storefront_test".to_string()),
            "JWT_SECRET" => Some("test-secret".to_string()),
            _ => None,
        })
        .unwrap();
        let db = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        create_router(AppState::new(db, config))
    }

    #[tokio::test]
    async fn health_check_responds() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn login_page_issues_csrf_cookie() {
        let response = test_app()
            .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("csrf_token=")));
    }

    #[tokio::test]
    async fn unsafe_request_without_token_is_rejected() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/cart/add")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"product_id":"00000000-0000-0000-0000-000000000000"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn mismatched_form_token_is_rejected() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/cart/clear")
                    .header(header::COOKIE, "csrf_token=expected")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("csrf_token=forged"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn cart_page_sends_anonymous_shoppers_to_login() {
        let response = test_app()
            .oneshot(Request::builder().uri("/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn api_cart_requires_sign_in() {
        let response = test_app()
            .oneshot(Request::builder().uri("/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Please sign in to continue");
    }

    #[tokio::test]
    async fn admin_pages_require_sign_in() {
        let response = test_app()
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
