//! Login and logout pages

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::HeaderMap,
    response::Response,
    Form,
};
use serde::Deserialize;

use crate::services::{LoginInput, UserServiceError};

use super::messages::Flash;
use super::middleware::{extract_session_token, AppState, ClientIp, CurrentUser, PageError, SESSION_COOKIE};
use super::responses::{page_context, redirect_with_cookies, render_page};

/// Where to go after login when no usable `next` was given
pub const DEFAULT_REDIRECT: &str = "/polls/";

/// Shown when the credentials do not match an account
pub const INVALID_LOGIN_MESSAGE: &str = "Please enter a correct username and password.";

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Login form body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// GET /accounts/login/
pub async fn login_form(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    user: CurrentUser,
    flash: Flash,
) -> Result<Response, PageError> {
    let next = safe_next(query.next.as_deref());
    render_login(&state, &user, &flash, "", next, None)
}

/// POST /accounts/login/
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    user: CurrentUser,
    flash: Flash,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, PageError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();
    let next = safe_next(form.next.as_deref());

    let input = LoginInput::new(form.username.clone(), form.password).with_ip(ip);
    match state.user_service.login(input).await {
        Ok(session) => {
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
                SESSION_COOKIE,
                session.id,
                state.user_service.session_max_age_secs()
            );
            redirect_with_cookies(next, &[cookie])
        }
        Err(UserServiceError::AuthenticationFailed) => {
            render_login(&state, &user, &flash, &form.username, next, Some(INVALID_LOGIN_MESSAGE))
        }
        Err(UserServiceError::ValidationError(msg)) => {
            render_login(&state, &user, &flash, &form.username, next, Some(msg.as_str()))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET or POST /accounts/logout/
///
/// Always clears the cookie and redirects, signed in or not.
pub async fn logout(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    // An absent token still announces the logout, with no user attached
    let token = extract_session_token(&headers).unwrap_or_default();
    state.user_service.logout(&token, ip.as_deref()).await?;

    let clear = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    redirect_with_cookies(DEFAULT_REDIRECT, &[clear])
}

fn render_login(
    state: &AppState,
    user: &CurrentUser,
    flash: &Flash,
    username: &str,
    next: &str,
    error_message: Option<&str>,
) -> Result<Response, PageError> {
    let mut context = page_context(user, &flash.0);
    context.insert("username", username);
    context.insert("next", next);
    context.insert("error_message", &error_message);
    render_page(state, "registration/login.html", &context, &flash.0)
}

/// Accept only local absolute paths as redirect targets
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => DEFAULT_REDIRECT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_accepts_local_paths() {
        assert_eq!(safe_next(Some("/polls/3/")), "/polls/3/");
        assert_eq!(safe_next(Some("/")), "/");
    }

    #[test]
    fn test_safe_next_rejects_other_targets() {
        for next in [
            None,
            Some(""),
            Some("polls/"),
            Some("//evil.example/"),
            Some("https://evil.example/"),
            Some("/\\evil.example"),
            Some("/polls/\r\nSet-Cookie: x=1"),
        ] {
            assert_eq!(safe_next(next), DEFAULT_REDIRECT, "{:?}", next);
        }
    }
}
