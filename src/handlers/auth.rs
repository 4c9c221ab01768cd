use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
    http::StatusCode,
    Json,
};
use askama::Template;
use serde_json::json;
use tower_cookies::Cookies;

use crate::{
    error::{AppError, PageResult, Result},
    handlers::{page_context, PageContext},
    middleware::{authenticate_user, csrf_token, end_session, get_current_user, start_session},
    models::{CreateUser, LoginRequest, User, UserResponse},
    state::AppState,
    utils::{flash_success, hash_password},
};

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    ctx: PageContext,
    error: String,
    email: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    ctx: PageContext,
    error: String,
}

pub async fn login_page(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Response> {
    if get_current_user(&cookies, &state).await.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let template = LoginTemplate {
        ctx: page_context(&cookies, &state, None).await,
        error: String::new(),
        email: String::new(),
    };
    Ok(Html(template.render()?).into_response())
}

pub async fn register_page(
    cookies: Cookies,
    State(state): State<AppState>,
) -> PageResult<Html<String>> {
    let template = RegisterTemplate {
        ctx: page_context(&cookies, &state, None).await,
        error: String::new(),
    };
    Ok(Html(template.render()?))
}

pub async fn login(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> PageResult<Response> {
    match authenticate_user(&state, &form.email, &form.password).await {
        Ok(user) => {
            start_session(&cookies, &state, &user).await?;
            flash_success(&cookies, format!("Welcome back, {}!", user.first_name));
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::InvalidCredentials) => {
            log::info!("Failed login attempt for {}", form.email);
            let template = LoginTemplate {
                ctx: page_context(&cookies, &state, None).await,
                error: AppError::InvalidCredentials.to_string(),
                email: form.email,
            };
            Ok((StatusCode::UNAUTHORIZED, Html(template.render()?)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(cookies: Cookies, State(state): State<AppState>) -> impl IntoResponse {
    end_session(&cookies, &state).await;
    Redirect::to("/login")
}

async fn create_user_in_db(state: &AppState, user_data: &CreateUser) -> Result<User> {
    let password_hash = hash_password(&user_data.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&user_data.email)
    .bind(&password_hash)
    .bind(&user_data.first_name)
    .bind(&user_data.last_name)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::from_write(e, "An account with this email already exists"))?;

    log::info!("Registered user {}", user.email);
    Ok(user)
}

pub async fn register(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<CreateUser>,
) -> PageResult<Response> {
    let result = match form.validate() {
        Ok(user_data) => create_user_in_db(&state, &user_data).await,
        Err(message) => Err(AppError::Validation(message)),
    };

    match result {
        Ok(_) => {
            flash_success(&cookies, "Account created. Please sign in.");
            Ok(Redirect::to("/login").into_response())
        }
        Err(e @ (AppError::Validation(_) | AppError::Conflict(_))) => {
            let template = RegisterTemplate {
                ctx: page_context(&cookies, &state, None).await,
                error: e.to_string(),
            };
            Ok((StatusCode::BAD_REQUEST, Html(template.render()?)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `GET /api/csrf`: hands JSON clients the token they must echo in `X-CSRF-Token`.
pub async fn api_csrf(cookies: Cookies) -> Json<serde_json::Value> {
    Json(json!({ "csrf_token": csrf_token(&cookies) }))
}

pub async fn api_login(
    cookies: Cookies,
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserResponse>> {
    let user = authenticate_user(&state, &request.email, &request.password).await?;
    start_session(&cookies, &state, &user).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn api_logout(cookies: Cookies, State(state): State<AppState>) -> StatusCode {
    end_session(&cookies, &state).await;
    StatusCode::NO_CONTENT
}
