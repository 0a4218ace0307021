use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes that require a valid, unrevoked access token of any role. The router is wrapped in
/// the authentication middleware in `create_router`; handlers receive the verified `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /auth/logout
        // Records the token's jti in the blacklist store. Every later request bearing the
        // same token is rejected with 401 even though it has not expired.
        .route("/auth/logout", post(handlers::logout))
        // GET /protected
        // Echoes the identity and role carried by the token.
        .route("/protected", get(handlers::protected))
}
