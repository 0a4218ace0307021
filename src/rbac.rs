//! Role Gate.
//!
//! Each entity route is wrapped in `role_gate`, which runs the full token verification
//! (via the `AuthUser` extractor), checks the token's role against the route's allowed set,
//! and only then dispatches to the handler. The stages short-circuit in order:
//! missing/invalid token (401), role outside the set (403), handler.

use axum::{
    extract::{FromRef, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::{
    AppState, auth::AuthUser, config::AppConfig, error::AppError, models::Role,
    repository::RepositoryState,
};

/// Whether `role` is in the route's allowed set.
pub fn allowed(route_roles: &[Role], role: Role) -> bool {
    route_roles.contains(&role)
}

pub fn authorize(route_roles: &[Role], user: &AuthUser) -> Result<(), AppError> {
    if allowed(route_roles, user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// GateState
///
/// The application state plus the static role set of the one route being guarded.
#[derive(Clone)]
pub struct GateState {
    state: AppState,
    roles: &'static [Role],
}

impl FromRef<GateState> for RepositoryState {
    fn from_ref(gate: &GateState) -> RepositoryState {
        gate.state.repo.clone()
    }
}

impl FromRef<GateState> for AppConfig {
    fn from_ref(gate: &GateState) -> AppConfig {
        gate.state.config.clone()
    }
}

/// role_gate
///
/// Middleware form of the gate. The verified `AuthUser` is stored in the request extensions
/// so the handler's own extractor does not hit the blacklist store a second time.
pub async fn role_gate(
    State(gate): State<GateState>,
    user: AuthUser,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(err) = authorize(gate.roles, &user) {
        tracing::debug!(email = %user.email, role = %user.role, "Role not permitted on route");
        return Err(err);
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Wraps every method of `route` in the gate for `roles`.
pub fn gated(
    route: MethodRouter<AppState>,
    state: &AppState,
    roles: &'static [Role],
) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(
        GateState {
            state: state.clone(),
            roles,
        },
        role_gate,
    ))
}
