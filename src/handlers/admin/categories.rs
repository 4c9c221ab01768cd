use axum::{
    extract::{Form, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use sqlx::FromRow;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::{AppError, PageResult},
    handlers::{flash_or_fail, page_context, PageContext},
    middleware::require_admin,
    models::{Category, CategoryForm},
    services::catalog,
    state::AppState,
    utils::flash_success,
};

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    product_count: i64,
    is_active: bool,
}

#[derive(Template)]
#[template(path = "admin/categories.html")]
struct CategoriesTemplate {
    ctx: PageContext,
    categories: Vec<CategoryRow>,
}

#[derive(Template)]
#[template(path = "admin/category_form.html")]
struct CategoryFormTemplate {
    ctx: PageContext,
    id: Uuid,
    name: String,
    description: String,
    is_active: bool,
}

const DUPLICATE_NAME: &str = "A category with that name already exists";

pub async fn categories_list(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Html<String>> {
    let admin = require_admin(&cookies, &state).await?;

    let categories = sqlx::query_as::<_, CategoryRow>(
        r#"
        SELECT c.id, c.name, c.is_active, COUNT(p.id) AS product_count
        FROM categories c
        LEFT JOIN products p ON p.category_id = c.id
        GROUP BY c.id
        ORDER BY c.name
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let template = CategoriesTemplate {
        ctx: page_context(&cookies, &state, Some(&admin)).await,
        categories,
    };
    Ok(Html(template.render()?))
}

pub async fn create_category(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<CategoryForm>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    let input = match form.validate() {
        Ok(input) => input,
        Err(message) => return flash_or_fail(&cookies, AppError::Validation(message), "/admin/categories"),
    };

    let created = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, description, is_active) VALUES ($1, $2, $3) RETURNING *"
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.is_active)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::from_write(e, DUPLICATE_NAME));

    match created {
        Ok(category) => {
            log::info!("Admin {} created category {}", admin.email, category.name);
            flash_success(&cookies, format!("Category {} created", category.name));
            Ok(Redirect::to("/admin/categories").into_response())
        }
        Err(e) => flash_or_fail(&cookies, e, "/admin/categories"),
    }
}

pub async fn edit_category_form(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> PageResult<Html<String>> {
    let admin = require_admin(&cookies, &state).await?;
    let category = catalog::find_category(&state.db, category_id).await?;

    let template = CategoryFormTemplate {
        ctx: page_context(&cookies, &state, Some(&admin)).await,
        id: category.id,
        name: category.name,
        description: category.description.unwrap_or_default(),
        is_active: category.is_active,
    };
    Ok(Html(template.render()?))
}

pub async fn update_category(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Form(form): Form<CategoryForm>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    let back = format!("/admin/categories/{}/edit", category_id);
    let input = match form.validate() {
        Ok(input) => input,
        Err(message) => return flash_or_fail(&cookies, AppError::Validation(message), &back),
    };

    let updated = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories
        SET name = $1, description = $2, is_active = $3, updated_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.is_active)
    .bind(category_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| AppError::from_write(e, DUPLICATE_NAME))
    .and_then(|row| row.ok_or_else(|| AppError::not_found("Category")));

    match updated {
        Ok(category) => {
            log::info!("Admin {} updated category {}", admin.email, category.name);
            flash_success(&cookies, format!("Category {} saved", category.name));
            Ok(Redirect::to("/admin/categories").into_response())
        }
        Err(e) => flash_or_fail(&cookies, e, &back),
    }
}

// Refused while any product still points at the category
pub async fn delete_category(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;

    let deleted = sqlx::query_scalar::<_, String>("DELETE FROM categories WHERE id = $1 RETURNING name")
        .bind(category_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            AppError::from_write(e, "Move or delete this category's products before deleting it")
        })
        .and_then(|name| name.ok_or_else(|| AppError::not_found("Category")));

    match deleted {
        Ok(name) => {
            log::info!("Admin {} deleted category {}", admin.email, name);
            flash_success(&cookies, format!("Category {} deleted", name));
            Ok(Redirect::to("/admin/categories").into_response())
        }
        Err(e) => flash_or_fail(&cookies, e, "/admin/categories"),
    }
}
