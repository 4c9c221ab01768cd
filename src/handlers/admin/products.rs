use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, PageResult, Result},
    handlers::{flash_or_fail, page_context, PageContext},
    middleware::{require_admin, CurrentUser},
    models::{Category, Product, ProductDisplay, ProductForm, ProductInput},
    services::catalog::{self, CatalogQuery},
    state::AppState,
    utils::{flash_success, FlashKind},
};

#[derive(Template)]
#[template(path = "admin/products.html")]
struct ProductsTemplate {
    ctx: PageContext,
    q: String,
    products: Vec<ProductDisplay>,
    page: i64,
    total_pages: i64,
}

#[derive(Template)]
#[template(path = "admin/product_form.html")]
struct ProductFormTemplate {
    ctx: PageContext,
    is_new: bool,
    action: String,
    categories: Vec<Category>,
    form: ProductFormValues,
}

/// What the product form shows: raw strings so a rejected submission can be redisplayed as typed.
#[derive(Debug, Clone, Default)]
struct ProductFormValues {
    category_id: String,
    name: String,
    sku: String,
    description: String,
    price: String,
    stock_quantity: String,
    image_url: String,
    is_active: bool,
}

impl From<&Product> for ProductFormValues {
    fn from(p: &Product) -> Self {
        Self {
            category_id: p.category_id.to_string(),
            name: p.name.clone(),
            sku: p.sku.clone(),
            description: p.description.clone().unwrap_or_default(),
            price: format!("{:.2}", p.price),
            stock_quantity: p.stock_quantity.to_string(),
            image_url: p.image_url.clone().unwrap_or_default(),
            is_active: p.is_active,
        }
    }
}

impl From<&ProductForm> for ProductFormValues {
    fn from(f: &ProductForm) -> Self {
        Self {
            category_id: f.category_id.clone(),
            name: f.name.clone(),
            sku: f.sku.clone(),
            description: f.description.clone().unwrap_or_default(),
            price: f.price.clone(),
            stock_quantity: f.stock_quantity.clone(),
            image_url: f.image_url.clone().unwrap_or_default(),
            is_active: f.is_active.is_some(),
        }
    }
}

const DUPLICATE_SKU: &str = "A product with that SKU already exists";

async fn render_form(
    cookies: &Cookies,
    state: &AppState,
    admin: &CurrentUser,
    product_id: Option<Uuid>,
    form: ProductFormValues,
    error: Option<String>,
) -> PageResult<Response> {
    let mut ctx = page_context(cookies, state, Some(admin)).await;
    let status = match error {
        Some(message) => {
            ctx.flash_message = message;
            ctx.flash_kind = FlashKind::Error.as_str().to_string();
            StatusCode::BAD_REQUEST
        }
        None => StatusCode::OK,
    };

    let template = ProductFormTemplate {
        ctx,
        is_new: product_id.is_none(),
        action: match product_id {
            Some(id) => format!("/admin/products/{}", id),
            None => "/admin/products".to_string(),
        },
        categories: catalog::list_categories(&state.db, false).await?,
        form,
    };
    Ok((status, Html(template.render()?)).into_response())
}

async fn load_product(db: &Database, product_id: Uuid) -> Result<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
}

async fn ensure_category(db: &Database, category_id: Uuid) -> Result<()> {
    match catalog::find_category(db, category_id).await {
        Ok(_) => Ok(()),
        Err(AppError::NotFound(_)) => Err(AppError::validation("Please choose an existing category")),
        Err(e) => Err(e),
    }
}

async fn insert_product(db: &Database, input: &ProductInput) -> Result<Product> {
    ensure_category(db, input.category_id).await?;
    sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (category_id, name, sku, description, price, stock_quantity, image_url, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(input.category_id)
    .bind(&input.name)
    .bind(&input.sku)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.stock_quantity)
    .bind(&input.image_url)
    .bind(input.is_active)
    .fetch_one(db)
    .await
    .map_err(|e| AppError::from_write(e, DUPLICATE_SKU))
}

async fn update_product_row(db: &Database, product_id: Uuid, input: &ProductInput) -> Result<Product> {
    ensure_category(db, input.category_id).await?;
    sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET category_id = $1, name = $2, sku = $3, description = $4, price = $5,
            stock_quantity = $6, image_url = $7, is_active = $8, updated_at = NOW()
        WHERE id = $9
        RETURNING *
        "#,
    )
    .bind(input.category_id)
    .bind(&input.name)
    .bind(&input.sku)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.stock_quantity)
    .bind(&input.image_url)
    .bind(input.is_active)
    .bind(product_id)
    .fetch_optional(db)
    .await
    .map_err(|e| AppError::from_write(e, DUPLICATE_SKU))?
    .ok_or_else(|| AppError::not_found("Product"))
}

// Every product, active or not, with the same search and paging as the shop
pub async fn products_list(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> PageResult<Html<String>> {
    let admin = require_admin(&cookies, &state).await?;
    let listing = catalog::list_products(&state.db, &query, false).await?;

    let template = ProductsTemplate {
        ctx: page_context(&cookies, &state, Some(&admin)).await,
        q: query.q.trim().to_string(),
        products: listing.products.into_iter().map(ProductDisplay::from).collect(),
        page: listing.page,
        total_pages: listing.total_pages,
    };
    Ok(Html(template.render()?))
}

pub async fn new_product_form(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    let form = ProductFormValues {
        price: "0.00".to_string(),
        stock_quantity: "0".to_string(),
        is_active: true,
        ..Default::default()
    };
    render_form(&cookies, &state, &admin, None, form, None).await
}

pub async fn create_product(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<ProductForm>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    let values = ProductFormValues::from(&form);

    let result = match form.validate() {
        Ok(input) => insert_product(&state.db, &input).await,
        Err(message) => Err(AppError::Validation(message)),
    };

    match result {
        Ok(product) => {
            log::info!("Admin {} created product {} ({})", admin.email, product.name, product.sku);
            flash_success(&cookies, format!("Product {} created", product.name));
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(e @ (AppError::Validation(_) | AppError::Conflict(_))) => {
            render_form(&cookies, &state, &admin, None, values, Some(e.to_string())).await
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn edit_product_form(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    let product = load_product(&state.db, product_id).await?;
    render_form(&cookies, &state, &admin, Some(product_id), (&product).into(), None).await
}

pub async fn update_product(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Form(form): Form<ProductForm>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    let values = ProductFormValues::from(&form);

    let result = match form.validate() {
        Ok(input) => update_product_row(&state.db, product_id, &input).await,
        Err(message) => Err(AppError::Validation(message)),
    };

    match result {
        Ok(product) => {
            log::info!("Admin {} updated product {} ({})", admin.email, product.name, product.sku);
            flash_success(&cookies, format!("Product {} saved", product.name));
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(e @ (AppError::Validation(_) | AppError::Conflict(_))) => {
            render_form(&cookies, &state, &admin, Some(product_id), values, Some(e.to_string())).await
        }
        Err(e) => Err(e.into()),
    }
}

// Past order lines keep their snapshot; carts holding the product lose the line
pub async fn delete_product(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;

    let deleted = sqlx::query_scalar::<_, String>("DELETE FROM products WHERE id = $1 RETURNING name")
        .bind(product_id)
        .fetch_optional(&state.db)
        .await?;

    match deleted {
        Some(name) => {
            log::info!("Admin {} deleted product {}", admin.email, name);
            flash_success(&cookies, format!("Product {} deleted", name));
            Ok(Redirect::to("/admin/products").into_response())
        }
        None => flash_or_fail(&cookies, AppError::not_found("Product"), "/admin/products"),
    }
}
