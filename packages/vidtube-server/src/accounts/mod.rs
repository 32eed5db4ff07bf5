//! Registration and profile management around the session core.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::error::ApiError;
use crate::media::{store_media, MediaHost};
use crate::storage::{normalize_identifier, NewUser, StorageError, UserPatch, UserStore, UserView};

/// Text fields of a registration form
#[derive(Debug, Default, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// Profile updates available to a signed-in user
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    media: Arc<dyn MediaHost>,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, media: Arc<dyn MediaHost>) -> Self {
        Self { store, media }
    }

    /// Create an account. The avatar is required; the cover image is optional
    /// and silently left empty if its upload fails.
    pub async fn register(
        &self,
        request: RegisterRequest,
        avatar: Option<&Path>,
        cover_image: Option<&Path>,
    ) -> Result<UserView, ApiError> {
        let full_name = request.full_name.trim();
        let (Some(username), Some(email)) = (
            normalize_identifier(&request.username),
            normalize_identifier(&request.email),
        ) else {
            return Err(ApiError::validation("All fields are required"));
        };
        if full_name.is_empty() || request.password.trim().is_empty() {
            return Err(ApiError::validation("All fields are required"));
        }

        if self
            .store
            .find_by_identifier(Some(&username), Some(&email))
            .await?
            .is_some()
        {
            warn!("Registration rejected, {} or {} already taken", username, email);
            return Err(ApiError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let Some(avatar_path) = avatar else {
            return Err(ApiError::validation("Avatar file is required"));
        };

        let avatar = store_media(self.media.as_ref(), avatar_path)
            .await
            .ok_or_else(|| ApiError::Upstream("Failed to upload avatar".to_string()))?;

        let cover_image = match cover_image {
            Some(path) => store_media(self.media.as_ref(), path)
                .await
                .map(|media| media.url)
                .unwrap_or_default(),
            None => String::new(),
        };

        let password_hash = hash_password(&request.password)?;

        let user = self
            .store
            .create_user(NewUser {
                username,
                email,
                full_name: full_name.to_string(),
                avatar: avatar.url,
                cover_image,
                password_hash,
            })
            .await?;

        info!("Registered user {}", user.username);
        Ok(UserView::from(&user))
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserView, ApiError> {
        let user = self.store.get_user(user_id).await?;
        Ok(UserView::from(&user))
    }

    /// Update display name and email; both are required
    pub async fn update_account(
        &self,
        user_id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<UserView, ApiError> {
        let full_name = full_name.trim();
        let Some(email) = normalize_identifier(email) else {
            return Err(ApiError::validation("All fields are required"));
        };
        if full_name.is_empty() {
            return Err(ApiError::validation("All fields are required"));
        }

        let user = self
            .store
            .update_fields(
                user_id,
                UserPatch {
                    full_name: Some(full_name.to_string()),
                    email: Some(email),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| match e {
                StorageError::DuplicateUser(_) => {
                    ApiError::Conflict("Email is already in use".to_string())
                }
                other => other.into(),
            })?;

        info!("Updated account details for {}", user.username);
        Ok(UserView::from(&user))
    }

    pub async fn update_avatar(&self, user_id: Uuid, path: &Path) -> Result<UserView, ApiError> {
        let media = store_media(self.media.as_ref(), path)
            .await
            .ok_or_else(|| ApiError::Upstream("Error while uploading avatar".to_string()))?;

        let user = self
            .store
            .update_fields(
                user_id,
                UserPatch {
                    avatar: Some(media.url),
                    ..Default::default()
                },
            )
            .await?;
        Ok(UserView::from(&user))
    }

    pub async fn update_cover_image(
        &self,
        user_id: Uuid,
        path: &Path,
    ) -> Result<UserView, ApiError> {
        let media = store_media(self.media.as_ref(), path)
            .await
            .ok_or_else(|| ApiError::Upstream("Error while uploading cover image".to_string()))?;

        let user = self
            .store
            .update_fields(
                user_id,
                UserPatch {
                    cover_image: Some(media.url),
                    ..Default::default()
                },
            )
            .await?;
        Ok(UserView::from(&user))
    }

    /// Ordered video ids the user has watched
    pub async fn watch_history(&self, user_id: Uuid) -> Result<Vec<Uuid>, ApiError> {
        Ok(self.store.get_user(user_id).await?.watch_history)
    }
}
