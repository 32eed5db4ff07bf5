use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers::{
    change_password, current_user, health_check, login, logout, refresh_access_token, register,
    update_account, update_avatar, update_cover_image, watch_history,
};
use crate::state::ServerState;

/// Build the HTTP router: account routes under `/api/v1/users` plus `/health`
pub fn build_router(state: Arc<ServerState>) -> Router {
    let max_body_size = state.config.max_body_size;
    let max_upload_size = state.config.max_upload_size as usize;

    let public_routes = Router::new()
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_access_token))
        .layer(RequestBodyLimitLayer::new(max_body_size));

    // Multipart routes replace axum's default limit with the upload limit
    let public_upload_routes = Router::new()
        .route("/register", post(register))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size));

    let protected_routes = Router::new()
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/history", get(watch_history))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let protected_upload_routes = Router::new()
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let user_routes = Router::new()
        .merge(public_routes)
        .merge(public_upload_routes)
        .merge(protected_routes)
        .merge(protected_upload_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/users", user_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
