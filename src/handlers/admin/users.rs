use axum::{
    extract::{Form, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, PageResult, Result},
    handlers::{flash_or_fail, page_context, PageContext},
    middleware::require_admin,
    models::{Role, User},
    state::AppState,
    utils::flash_success,
};

#[derive(Debug, Clone)]
struct UserDisplay {
    id: Uuid,
    name: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    role: String,
    is_active: bool,
    last_login: String,
    is_self: bool,
}

impl UserDisplay {
    fn new(user: User, viewer_id: Uuid) -> Self {
        Self {
            id: user.id,
            name: user.full_name(),
            is_self: user.id == viewer_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone.unwrap_or_default(),
            role: user.role,
            is_active: user.is_active,
            last_login: user
                .last_login
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/users.html")]
struct UsersTemplate {
    ctx: PageContext,
    users: Vec<UserDisplay>,
}

#[derive(Template)]
#[template(path = "admin/user_form.html")]
struct UserFormTemplate {
    ctx: PageContext,
    user: UserDisplay,
}

#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: Option<String>, // HTML checkboxes send "on" or nothing
}

/// An admin may edit their own name, but never lock themselves out.
fn check_self_edit(admin_id: Uuid, target_id: Uuid, role: Role, is_active: bool) -> Result<()> {
    if admin_id != target_id {
        return Ok(());
    }
    if role != Role::Admin {
        return Err(AppError::validation("You cannot remove your own admin role"));
    }
    if !is_active {
        return Err(AppError::validation("You cannot deactivate your own account"));
    }
    Ok(())
}

async fn load_user(db: &Database, user_id: Uuid) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn users_list(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Html<String>> {
    let admin = require_admin(&cookies, &state).await?;

    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY last_name, first_name")
        .fetch_all(&state.db)
        .await?
        .into_iter()
        .map(|u| UserDisplay::new(u, admin.id))
        .collect();

    let template = UsersTemplate {
        ctx: page_context(&cookies, &state, Some(&admin)).await,
        users,
    };
    Ok(Html(template.render()?))
}

pub async fn edit_user_form(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> PageResult<Html<String>> {
    let admin = require_admin(&cookies, &state).await?;
    let user = load_user(&state.db, user_id).await?;

    let template = UserFormTemplate {
        ctx: page_context(&cookies, &state, Some(&admin)).await,
        user: UserDisplay::new(user, admin.id),
    };
    Ok(Html(template.render()?))
}

pub async fn update_user(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Form(form): Form<UserForm>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    let back = format!("/admin/users/{}/edit", user_id);

    let first_name = form.first_name.trim().to_string();
    let last_name = form.last_name.trim().to_string();
    if first_name.is_empty() || last_name.is_empty() {
        return flash_or_fail(&cookies, AppError::validation("First and last name are required"), &back);
    }
    let role = match form.role.parse::<Role>() {
        Ok(role) => role,
        Err(message) => return flash_or_fail(&cookies, AppError::Validation(message), &back),
    };
    let is_active = form.is_active.is_some();
    if let Err(e) = check_self_edit(admin.id, user_id, role, is_active) {
        return flash_or_fail(&cookies, e, &back);
    }

    let phone = form
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let updated = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET first_name = $1, last_name = $2, phone = $3, role = $4, is_active = $5, updated_at = NOW()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(&first_name)
    .bind(&last_name)
    .bind(&phone)
    .bind(role.as_str())
    .bind(is_active)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?;

    let Some(user) = updated else {
        return flash_or_fail(&cookies, AppError::not_found("User"), "/admin/users");
    };

    // A deactivated account loses its sessions straight away.
    if !user.is_active {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user.id)
            .execute(&state.db)
            .await?;
    }

    log::info!("Admin {} updated user {} (role {}, active {})", admin.email, user.email, user.role, user.is_active);
    flash_success(&cookies, format!("User {} saved", user.email));
    Ok(Redirect::to("/admin/users").into_response())
}

// Users with orders can't be deleted; deactivate them instead
pub async fn delete_user(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> PageResult<Response> {
    let admin = require_admin(&cookies, &state).await?;
    if admin.id == user_id {
        return flash_or_fail(&cookies, AppError::validation("You cannot delete your own account"), "/admin/users");
    }

    let deleted = sqlx::query_scalar::<_, String>("DELETE FROM users WHERE id = $1 RETURNING email")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| AppError::from_write(e, "This user has orders; deactivate the account instead"))
        .and_then(|email| email.ok_or_else(|| AppError::not_found("User")));

    match deleted {
        Ok(email) => {
            log::info!("Admin {} deleted user {}", admin.email, email);
            flash_success(&cookies, format!("User {} deleted", email));
            Ok(Redirect::to("/admin/users").into_response())
        }
        Err(e) => flash_or_fail(&cookies, e, "/admin/users"),
    }
}
