//! Flash messages
//!
//! A redirect stores its messages in the `messages` cookie as urlencoded
//! JSON; the next rendered page shows them and clears the cookie.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use super::middleware::cookie_value;

/// Name of the flash cookie
pub const MESSAGES_COOKIE: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Warning,
    Error,
}

/// One flash message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

impl FlashMessage {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Level::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Level::Error, text)
    }
}

/// Messages carried in by the request
#[derive(Debug, Clone, Default)]
pub struct Flash(pub Vec<FlashMessage>);

impl<S: Send + Sync> FromRequestParts<S> for Flash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Flash(read_messages(&parts.headers)))
    }
}

/// Decode the flash cookie; a malformed cookie reads as no messages
pub fn read_messages(headers: &HeaderMap) -> Vec<FlashMessage> {
    let Some(raw) = cookie_value(headers, MESSAGES_COOKIE) else {
        return Vec::new();
    };

    urlencoding::decode(&raw)
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

/// `Set-Cookie` value storing `messages`
pub fn store_cookie(messages: &[FlashMessage]) -> String {
    let json = serde_json::to_string(messages).unwrap_or_else(|_| "[]".to_string());
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        MESSAGES_COOKIE,
        urlencoding::encode(&json)
    )
}

/// `Set-Cookie` value removing the flash cookie
pub fn clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", MESSAGES_COOKIE)
}
