use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::cookies::ACCESS_COOKIE_NAME;
use crate::error::ApiError;
use crate::state::ServerState;
use crate::storage::{StorageError, UserView};

/// Identity resolved by the auth guard, available to handlers as an extension
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub view: UserView,
}

/// Pull the access token from the cookie, falling back to a bearer header
pub fn extract_access_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE_NAME) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
}

/// Authentication middleware for protected routes
pub async fn auth_middleware(
    State(state): State<Arc<ServerState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    // Resolve the token before awaiting; the request body is not Sync
    let token = extract_access_token(&jar, &request);

    match authenticate(&state, token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

async fn authenticate(
    state: &ServerState,
    token: Option<String>,
) -> Result<AuthenticatedUser, ApiError> {
    let Some(token) = token else {
        return Err(ApiError::unauthorized("Unauthorized request"));
    };

    // Expired and forged tokens get the same answer; the client refreshes either way
    let claims = state.sessions.tokens().verify_access(&token).map_err(|e| {
        warn!("Rejected access token: {}", e);
        ApiError::unauthorized("Invalid access token")
    })?;

    let user = match state.user_store.get_user(claims.sub).await {
        Ok(user) => user,
        Err(StorageError::UserNotFound(id)) => {
            warn!("Access token for missing user {}", id);
            return Err(ApiError::unauthorized("Invalid access token"));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(AuthenticatedUser {
        id: user.id,
        view: UserView::from(&user),
    })
}
