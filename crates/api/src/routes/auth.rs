//! Google sign-in, logout and the current user.

use axum::extract::State;
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use services::{CALLBACK_PATH, random_token};
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::dto::{CallbackQuery, UserDto};
use crate::error::ApiError;
use crate::extract::{ApiQuery, CurrentUser, SESSION_COOKIE};
use crate::state::AppState;

const STATE_COOKIE: &str = "sl_oauth_state";
const STATE_TTL_MINUTES: i64 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/login", get(login))
        .route(CALLBACK_PATH, get(callback))
        .route("/api/logout", get(logout))
        .route("/api/auth/user", get(current_user))
}

fn cookie(state: &AppState, name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookies)
        .max_age(max_age)
        .build()
}

fn expired(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

async fn login(State(state): State<AppState>, cookies: Cookies) -> Result<Redirect, ApiError> {
    let nonce = random_token();
    let url = state.services.oauth().authorize_url(&nonce)?;
    cookies.add(cookie(
        &state,
        STATE_COOKIE,
        nonce,
        Duration::minutes(STATE_TTL_MINUTES),
    ));
    Ok(Redirect::to(url.as_str()))
}

/// Provider redirect target. Failures send the browser home with an error
/// code instead of a JSON body.
async fn callback(
    State(state): State<AppState>,
    cookies: Cookies,
    ApiQuery(query): ApiQuery<CallbackQuery>,
) -> Redirect {
    let expected = cookies.get(STATE_COOKIE).map(|c| c.value().to_owned());
    cookies.remove(expired(STATE_COOKIE));

    if let Some(error) = query.error {
        tracing::warn!(%error, "identity provider refused sign-in");
        return Redirect::to("/?error=auth_failed");
    }
    let (Some(code), Some(returned)) = (query.code, query.state) else {
        return Redirect::to("/?error=auth_failed");
    };
    if expected.as_deref() != Some(returned.as_str()) {
        tracing::warn!("oauth state mismatch");
        return Redirect::to("/?error=auth_failed");
    }

    let profile = match state.services.oauth().exchange_code(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "code exchange failed");
            return Redirect::to("/?error=auth_failed");
        }
    };
    let ttl_seconds = match state.services.auth().login(profile).await {
        Ok(login) => {
            let ttl = (login.session.expires_at - login.session.created_at).num_seconds();
            cookies.add(cookie(
                &state,
                SESSION_COOKIE,
                login.session.token,
                Duration::seconds(ttl),
            ));
            ttl
        }
        Err(e) if e.is_domain_restricted() => return Redirect::to("/?error=domain_restricted"),
        Err(e) => {
            tracing::error!(error = %e, "login failed");
            return Redirect::to("/?error=auth_failed");
        }
    };
    tracing::debug!(ttl_seconds, "session cookie issued");
    Redirect::to("/")
}

async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Redirect, ApiError> {
    if let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_owned()) {
        state.services.auth().logout(&token).await?;
    }
    cookies.remove(expired(SESSION_COOKIE));
    Ok(Redirect::to("/"))
}

async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserDto> {
    Json(user.into())
}
