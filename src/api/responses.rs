//! Shared page responses
//!
//! Helpers used by every page handler: the base template context, page
//! rendering with flash cleanup, and 302 redirects.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use super::messages::{self, FlashMessage};
use super::middleware::{AppState, CurrentUser, PageError};

/// Context with the variables `base.html` expects
pub fn page_context(user: &CurrentUser, messages: &[FlashMessage]) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("current_user", &user.user());
    context.insert("messages", messages);
    context
}

/// Render `template` as a 200 page
///
/// `shown` is the flash list displayed on this page; when non-empty the
/// flash cookie is cleared so the messages appear only once.
pub fn render_page(
    state: &AppState,
    template: &str,
    context: &TeraContext,
    shown: &[FlashMessage],
) -> Result<Response, PageError> {
    let html = state.templates.render(template, context)?;

    let mut headers = HeaderMap::new();
    if !shown.is_empty() {
        headers.insert(header::SET_COOKIE, header_value(&messages::clear_cookie())?);
    }

    Ok((StatusCode::OK, headers, Html(html)).into_response())
}

/// 302 Found to `location`
pub fn redirect(location: &str) -> Result<Response, PageError> {
    redirect_with_cookies(location, &[])
}

/// 302 Found to `location`, carrying `message` to the next page
pub fn redirect_with_message(location: &str, message: FlashMessage) -> Result<Response, PageError> {
    redirect_with_cookies(location, &[messages::store_cookie(&[message])])
}

/// 302 Found to `location` with one `Set-Cookie` header per entry
pub fn redirect_with_cookies(location: &str, cookies: &[String]) -> Result<Response, PageError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, header_value(location)?);
    for cookie in cookies {
        headers.append(header::SET_COOKIE, header_value(cookie)?);
    }

    Ok((StatusCode::FOUND, headers).into_response())
}

fn header_value(value: &str) -> Result<HeaderValue, PageError> {
    HeaderValue::from_str(value)
        .map_err(|e| PageError::Internal(anyhow::anyhow!("Invalid header value: {}", e)))
}

/// Parse a path id; anything that is not an integer is a 404
pub fn parse_id(raw: &str) -> Result<i64, PageError> {
    raw.parse::<i64>().map_err(|_| PageError::NotFound)
}
