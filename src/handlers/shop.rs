use axum::{
    extract::{Path, Query, State},
    response::Html,
};
use askama::Template;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::PageResult,
    handlers::{page_context, PageContext},
    middleware::get_current_user,
    models::{Category, ProductDisplay},
    services::catalog::{self, CatalogQuery},
    state::AppState,
};

#[derive(Template)]
#[template(path = "shop/catalog.html")]
struct CatalogTemplate {
    ctx: PageContext,
    categories: Vec<Category>,
    selected_category: String,
    q: String,
    products: Vec<ProductDisplay>,
    page: i64,
    total_pages: i64,
}

#[derive(Template)]
#[template(path = "shop/product.html")]
struct ProductTemplate {
    ctx: PageContext,
    product: ProductDisplay,
}

// Storefront home: active products, filtered by category and search text, 12 per page
pub async fn catalog(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> PageResult<Html<String>> {
    let user = get_current_user(&cookies, &state).await;

    let categories = catalog::list_categories(&state.db, true).await?;
    let listing = catalog::list_products(&state.db, &query, true).await?;

    let template = CatalogTemplate {
        ctx: page_context(&cookies, &state, user.as_ref()).await,
        categories,
        selected_category: query.category().map(|id| id.to_string()).unwrap_or_default(),
        q: query.q.trim().to_string(),
        products: listing.products.into_iter().map(ProductDisplay::from).collect(),
        page: listing.page,
        total_pages: listing.total_pages,
    };
    Ok(Html(template.render()?))
}

pub async fn product_detail(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> PageResult<Html<String>> {
    let user = get_current_user(&cookies, &state).await;
    let product = catalog::find_listing(&state.db, product_id, true).await?;

    let template = ProductTemplate {
        ctx: page_context(&cookies, &state, user.as_ref()).await,
        product: product.into(),
    };
    Ok(Html(template.render()?))
}
