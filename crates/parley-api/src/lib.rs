pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

pub use auth::{AppState, AppStateInner};

/// Public auth routes plus the token-guarded message routes.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/api/messages",
            get(messages::get_messages).post(messages::post_message),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    public_routes.merge(protected_routes)
}
