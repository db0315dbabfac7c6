//! HTTP layer - page handlers and routing
//!
//! - Poll pages: index, detail, results, vote
//! - Account pages: login, logout
//! - Session and error page middleware

pub mod auth;
pub mod messages;
pub mod middleware;
pub mod polls;
pub mod responses;

#[cfg(test)]
mod tests;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use messages::{Flash, FlashMessage};
pub use middleware::{client_ip, AppState, ClientIp, CurrentUser, PageError};

/// Page routes, without middleware
fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(polls::root))
        .route("/polls/", get(polls::index))
        .route("/polls/{id}/", get(polls::detail))
        .route("/polls/{id}/results/", get(polls::results))
        .route("/polls/{id}/vote/", get(polls::vote).post(polls::vote))
        .route("/accounts/login/", get(auth::login_form).post(auth::login))
        .route("/accounts/logout/", get(auth::logout).post(auth::logout))
        .fallback(polls::not_found)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    page_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::load_session,
                ))
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::render_error_pages,
                )),
        )
        .with_state(state)
}
