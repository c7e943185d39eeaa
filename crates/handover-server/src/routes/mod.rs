pub mod admin;
pub mod auth;
pub mod interviews;
pub mod knowledge;
pub mod personas;
pub mod qa;
pub mod roles;
pub mod topics;

use axum::middleware;
use axum::Router;

use crate::state::AppState;

/// `/api` routes. Register/login are open; everything else requires a
/// bearer token.
pub fn api_router(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .merge(auth::protected_router())
        .nest("/roles", roles::router())
        .nest("/interviews", interviews::router())
        .merge(knowledge::router())
        .nest("/personas", personas::router())
        .nest("/topics", topics::router())
        .nest("/qa", qa::router())
        .merge(admin::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    Router::new()
        .nest("/auth", auth::public_router())
        .merge(protected)
}
