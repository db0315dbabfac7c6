//! HTTP middleware and request extractors
//!
//! Contains:
//! - Session resolution (cookie token to `CurrentUser`)
//! - Error page rendering for `PageError` responses
//! - Client address extraction

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::models::User;
use crate::services::{PollService, PollServiceError, UserService, UserServiceError, VotingService};
use crate::templates::TemplateEngine;

use super::messages;
use super::responses::page_context;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub poll_service: Arc<PollService>,
    pub voting_service: Arc<VotingService>,
    pub user_service: Arc<UserService>,
    pub templates: Arc<TemplateEngine>,
}

/// The user behind the request's session cookie, if any
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Client address as reported by `client_ip`
#[derive(Debug, Clone, Default)]
pub struct ClientIp(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(&parts.headers, peer)))
    }
}

/// First non-empty `X-Forwarded-For` entry, else the peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}

/// Value of cookie `name`, if present
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Extract the session token from the request cookies
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).filter(|token| !token.is_empty())
}

/// Session middleware
///
/// Resolves the session cookie to a user and stores `CurrentUser` in the
/// request extensions. Unknown, expired or unreadable sessions are treated
/// as anonymous.
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut current = CurrentUser(None);

    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token, Utc::now()).await {
            Ok(user) => current = CurrentUser(user),
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }

    request.extensions_mut().insert(current);
    next.run(request).await
}

/// Error raised by page handlers
#[derive(Debug)]
pub enum PageError {
    NotFound,
    Internal(anyhow::Error),
}

/// Marker left on error responses for `render_error_pages`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPage(pub StatusCode);

impl From<PollServiceError> for PageError {
    fn from(e: PollServiceError) -> Self {
        match e {
            PollServiceError::NotFound => PageError::NotFound,
            PollServiceError::ValidationError(msg) => {
                PageError::Internal(anyhow::anyhow!("Validation error: {}", msg))
            }
            PollServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(e: UserServiceError) -> Self {
        PageError::Internal(anyhow::Error::new(e))
    }
}

impl From<anyhow::Error> for PageError {
    fn from(e: anyhow::Error) -> Self {
        PageError::Internal(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = match self {
            PageError::NotFound => StatusCode::NOT_FOUND,
            PageError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorPage(status));
        response
    }
}

/// Replace the body of `PageError` responses with the 404 or 500 page
///
/// Pending flash messages are shown on the error page and then cleared, the
/// same as on any other rendered page.
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .unwrap_or_default();
    let flash = messages::read_messages(request.headers());

    let response = next.run(request).await;
    let Some(ErrorPage(status)) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let context = page_context(&user, &flash);
    let html = if status == StatusCode::NOT_FOUND {
        state.templates.render_with_fallback("404.html", &context)
    } else {
        state.templates.server_error_page(&context)
    };

    let mut headers = HeaderMap::new();
    if !flash.is_empty() {
        if let Ok(clear) = HeaderValue::from_str(&messages::clear_cookie()) {
            headers.insert(header::SET_COOKIE, clear);
        }
    }

    (status, headers, Html(html)).into_response()
}
