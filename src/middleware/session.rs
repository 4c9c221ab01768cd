use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{Role, User},
    state::AppState,
    utils::{create_token, verify_token, Claims},
};

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub session_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_admin: bool,
}

impl CurrentUser {
    pub fn from_user(user: User, session_id: Uuid) -> Self {
        let role = user.role();
        Self {
            id: user.id,
            session_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role,
            is_admin: role == Role::Admin,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Resolves the signed-in user from the `auth_token` cookie.
/// A bad token, an expired session or an inactive user all mean anonymous.
pub async fn get_current_user(cookies: &Cookies, state: &AppState) -> Option<CurrentUser> {
    let token = cookies.get(AUTH_COOKIE)?.value().to_string();

    let claims = verify_token(&token, &state.config.jwt_secret).ok()?;
    let user_id = claims.user_id()?;
    let session_id = claims.session_id()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.*
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.id = $1 AND s.user_id = $2 AND s.expires_at > NOW() AND u.is_active = true
        "#,
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| log::error!("Failed to load session {}: {}", session_id, e))
    .ok()??;

    Some(CurrentUser::from_user(user, session_id))
}

pub async fn require_user(cookies: &Cookies, state: &AppState) -> Result<CurrentUser> {
    get_current_user(cookies, state).await.ok_or(AppError::Unauthorized)
}

pub async fn require_admin(cookies: &Cookies, state: &AppState) -> Result<CurrentUser> {
    let user = require_user(cookies, state).await?;
    if !user.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Records a session row for the user and sets the signed cookie pointing at it.
pub async fn start_session(cookies: &Cookies, state: &AppState, user: &User) -> Result<Uuid> {
    let ttl = Duration::hours(state.config.session_hours);
    let session_id = Uuid::new_v4();
    let expires_at = Utc::now() + ttl;

    sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(session_id)
        .bind(user.id)
        .bind(expires_at)
        .execute(&state.db)
        .await?;

    sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;

    // Expired sessions are swept here; a failed sweep doesn't fail the login.
    if let Err(e) = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND expires_at <= NOW()")
        .bind(user.id)
        .execute(&state.db)
        .await
    {
        log::warn!("Failed to clear expired sessions for user {}: {}", user.id, e);
    }

    let token = create_token(&Claims::new(user.id, session_id, ttl), &state.config.jwt_secret)?;

    let cookie = Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(tower_cookies::cookie::SameSite::Lax)
        .max_age(time::Duration::hours(state.config.session_hours))
        .build();
    cookies.add(cookie);

    log::info!("User {} signed in (session {})", user.email, session_id);
    Ok(session_id)
}

pub async fn end_session(cookies: &Cookies, state: &AppState) {
    if let Some(user) = get_current_user(cookies, state).await {
        if let Err(e) = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(user.session_id)
            .execute(&state.db)
            .await
        {
            log::error!("Failed to delete session {}: {}", user.session_id, e);
        }
    }
    cookies.remove(Cookie::build((AUTH_COOKIE, "")).path("/").build());
}

/// Checks an email/password pair against an active account.
pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = $1 AND is_active = true"
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    if crate::utils::verify_password(password, &user.password_hash).unwrap_or(false) {
        Ok(user)
    } else {
        Err(AppError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use sqlx::PgPool;

    fn test_state(pool: PgPool) -> AppState {
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/storefront_test".to_string()),
            "JWT_SECRET" => Some("test-secret".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(pool, config)
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn login_replaces_expired_sessions(pool: PgPool) {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name)
            VALUES ('returning@example.com', 'not-a-real-hash', 'Ret', 'Urning')
            RETURNING *
            "#,
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, NOW() - INTERVAL '1 hour')")
            .bind(Uuid::new_v4())
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();

        let state = test_state(pool.clone());
        let cookies = Cookies::default();
        let session_id = start_session(&cookies, &state, &user).await.unwrap();

        let remaining = sqlx::query_scalar::<_, Uuid>("SELECT id FROM sessions WHERE user_id = $1")
            .bind(user.id)
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, vec![session_id]);

        let current = get_current_user(&cookies, &state).await.unwrap();
        assert_eq!(current.session_id, session_id);
        assert_eq!(current.role, Role::Customer);
    }
}
