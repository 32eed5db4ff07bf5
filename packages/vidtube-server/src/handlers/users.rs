use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::uploads::read_multipart;
use super::ApiJson;
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::ServerState;
use crate::storage::UserView;

/// Account details update request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    pub full_name: String,
    pub email: String,
}

/// Current user endpoint
pub async fn current_user(
    State(state): State<Arc<ServerState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let view = state.accounts.current_user(user.id).await?;
    Ok(Json(ApiResponse::ok(view, "Current user fetched successfully")))
}

/// Update full name and email
pub async fn update_account(
    State(state): State<Arc<ServerState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let view = state
        .accounts
        .update_account(user.id, &request.full_name, &request.email)
        .await?;
    Ok(Json(ApiResponse::ok(
        view,
        "Account details updated successfully",
    )))
}

/// Replace the avatar image
pub async fn update_avatar(
    State(state): State<Arc<ServerState>>,
    Extension(user): Extension<AuthenticatedUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let view = replace_image(&state, user.id, multipart?, ImageSlot::Avatar).await?;
    Ok(Json(ApiResponse::ok(view, "Avatar updated successfully")))
}

/// Replace the cover image
pub async fn update_cover_image(
    State(state): State<Arc<ServerState>>,
    Extension(user): Extension<AuthenticatedUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let view = replace_image(&state, user.id, multipart?, ImageSlot::CoverImage).await?;
    Ok(Json(ApiResponse::ok(
        view,
        "Cover image updated successfully",
    )))
}

/// Ordered list of watched video ids
pub async fn watch_history(
    State(state): State<Arc<ServerState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<Uuid>>>, ApiError> {
    let history = state.accounts.watch_history(user.id).await?;
    Ok(Json(ApiResponse::ok(
        history,
        "Watch history fetched successfully",
    )))
}

#[derive(Debug, Clone, Copy)]
enum ImageSlot {
    Avatar,
    CoverImage,
}

impl ImageSlot {
    fn field(self) -> &'static str {
        match self {
            ImageSlot::Avatar => "avatar",
            ImageSlot::CoverImage => "coverImage",
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            ImageSlot::Avatar => "Avatar file is missing",
            ImageSlot::CoverImage => "Cover image file is missing",
        }
    }
}

async fn replace_image(
    state: &ServerState,
    user_id: Uuid,
    multipart: Multipart,
    slot: ImageSlot,
) -> Result<UserView, ApiError> {
    let form = read_multipart(multipart, &state.config.upload_directory, &[slot.field()]).await?;

    let result = match form.file(slot.field()) {
        Some(path) => match slot {
            ImageSlot::Avatar => state.accounts.update_avatar(user_id, path).await,
            ImageSlot::CoverImage => state.accounts.update_cover_image(user_id, path).await,
        },
        None => Err(ApiError::validation(slot.missing_message())),
    };

    form.discard().await;
    result
}
