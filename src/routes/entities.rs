use crate::{
    AppState,
    entity::{Dogs, Entity, HealthProblems, HealthRecords, Litters, Vets},
    handlers,
    rbac::gated,
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Entity Router Module
///
/// Registers the five CRUD resources:
///
/// | Path | Methods |
/// |---|---|
/// | `/<entities>` | `GET` (read roles), `POST` (write roles) |
/// | `/<entities>/{id}` | `GET` (read roles), `PUT` (write roles), `DELETE` (delete roles) |
///
/// Role sets are static metadata on each entity's descriptor.
pub fn entity_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(resource::<Dogs>(state))
        .merge(resource::<Vets>(state))
        .merge(resource::<HealthRecords>(state))
        .merge(resource::<Litters>(state))
        .merge(resource::<HealthProblems>(state))
}

fn resource<E: Entity>(state: &AppState) -> Router<AppState> {
    let path = E::DESCRIPTOR.path;
    let policy = E::DESCRIPTOR.policy;

    Router::new()
        .route(
            path,
            gated(get(handlers::list::<E>), state, policy.read)
                .merge(gated(post(handlers::create::<E>), state, policy.write)),
        )
        .route(
            &format!("{path}/{{id}}"),
            gated(get(handlers::get::<E>), state, policy.read)
                .merge(gated(put(handlers::update::<E>), state, policy.write))
                .merge(gated(delete(handlers::delete::<E>), state, policy.delete)),
        )
}
