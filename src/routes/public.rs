use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated**. Registration and login are the only way
/// to obtain a token, so they necessarily live here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        .route("/", get(handlers::index))
        // GET /health
        // Liveness probe for load balancers. Returns "ok" without touching the database.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates a credential and returns a first access token.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        .route("/auth/login", post(handlers::login))
}
