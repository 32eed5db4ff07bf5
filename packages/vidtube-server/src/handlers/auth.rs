use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::uploads::read_multipart;
use super::ApiJson;
use crate::accounts::RegisterRequest;
use crate::auth::{
    with_session_cookies, without_session_cookies, AuthenticatedUser, LoginRequest,
    REFRESH_COOKIE_NAME,
};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::ServerState;
use crate::storage::UserView;

const AVATAR_FIELD: &str = "avatar";
const COVER_IMAGE_FIELD: &str = "coverImage";

/// Login response body; the same tokens are also set as cookies
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RefreshRequest {
    refresh_token: Option<String>,
}

/// Change password request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Register endpoint (multipart with avatar and optional cover image)
pub async fn register(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), ApiError> {
    let form = read_multipart(
        multipart?,
        &state.config.upload_directory,
        &[AVATAR_FIELD, COVER_IMAGE_FIELD],
    )
    .await?;

    let request = RegisterRequest {
        username: form.field("username"),
        email: form.field("email"),
        full_name: form.field("fullName"),
        password: form.field("password"),
    };

    let result = state
        .accounts
        .register(request, form.file(AVATAR_FIELD), form.file(COVER_IMAGE_FIELD))
        .await;

    // Rejected registrations never reach the media host, so their files are still here
    form.discard().await;

    let user = result?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            StatusCode::OK,
            user,
            "User registered successfully",
        )),
    ))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<ServerState>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), ApiError> {
    let grant = state.sessions.login(request).await?;
    let jar = with_session_cookies(jar, &grant.tokens, state.config.cookie_secure);

    Ok((
        jar,
        Json(ApiResponse::ok(
            LoginResponse {
                user: grant.user,
                access_token: grant.tokens.access_token,
                refresh_token: grant.tokens.refresh_token,
            },
            "User logged in successfully",
        )),
    ))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<Arc<ServerState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<serde_json::Value>>), ApiError> {
    state.sessions.logout(user.id).await?;

    Ok((
        without_session_cookies(jar, state.config.cookie_secure),
        Json(ApiResponse::ok(
            serde_json::json!({}),
            "User logged out successfully",
        )),
    ))
}

/// Exchange a refresh token (cookie or JSON body) for a new pair
pub async fn refresh_access_token(
    State(state): State<Arc<ServerState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<ApiResponse<RefreshResponse>>), ApiError> {
    let incoming = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| refresh_token_from_body(&body));

    let Some(incoming) = incoming else {
        warn!("Refresh attempted without a token");
        return Err(ApiError::unauthorized("Unauthorized request"));
    };

    let grant = state.sessions.refresh(&incoming).await?;
    let jar = with_session_cookies(jar, &grant.tokens, state.config.cookie_secure);

    Ok((
        jar,
        Json(ApiResponse::ok(
            RefreshResponse {
                access_token: grant.tokens.access_token,
                refresh_token: grant.tokens.refresh_token,
            },
            "Access token refreshed",
        )),
    ))
}

fn refresh_token_from_body(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<RefreshRequest>(body)
        .ok()
        .and_then(|request| request.refresh_token)
        .filter(|token| !token.is_empty())
}

/// Change password endpoint
pub async fn change_password(
    State(state): State<Arc<ServerState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    state
        .sessions
        .change_password(user.id, &request.old_password, &request.new_password)
        .await?;

    Ok(Json(ApiResponse::ok(
        serde_json::json!({}),
        "Password changed successfully",
    )))
}
