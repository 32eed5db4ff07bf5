use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::password::{
    prepare_password_update, verify_dummy_password, verify_password, PasswordError,
};
use super::tokens::{TokenError, TokenIssuer, TokenPair};
use crate::error::ApiError;
use crate::storage::{normalize_identifier, StorageError, UserPatch, UserStore, UserView};

/// Login credentials: username or email, plus password
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// Result of a successful login or refresh
#[derive(Debug)]
pub struct SessionGrant {
    pub user: UserView,
    pub tokens: TokenPair,
}

/// Session errors. Kinds stay distinct for logging; several collapse to the
/// same status on the wire.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Username or email is required")]
    MissingIdentifier,
    #[error("Password is required")]
    MissingPassword,
    #[error("No user matches the identifier")]
    UnknownUser,
    #[error("Password does not match")]
    InvalidPassword,
    #[error("Old password does not match")]
    IncorrectOldPassword,
    #[error("Refresh token is invalid")]
    InvalidToken,
    #[error("Refresh token has expired")]
    TokenExpired,
    #[error("Refresh token reuse or stale token")]
    StaleRefreshToken,
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::MissingIdentifier | SessionError::MissingPassword => {
                ApiError::Validation(e.to_string())
            }
            // Same answer for both so the response does not reveal whether the account exists
            SessionError::UnknownUser | SessionError::InvalidPassword => {
                ApiError::Unauthorized("Invalid user credentials".to_string())
            }
            SessionError::IncorrectOldPassword => {
                ApiError::Unauthorized("Invalid old password".to_string())
            }
            SessionError::InvalidToken => {
                ApiError::Unauthorized("Invalid refresh token".to_string())
            }
            SessionError::TokenExpired => {
                ApiError::Unauthorized("Refresh token has expired".to_string())
            }
            SessionError::StaleRefreshToken => ApiError::Unauthorized(e.to_string()),
            SessionError::Token(e) => ApiError::Internal(format!(
                "Something went wrong while generating access and refresh token: {}",
                e
            )),
            SessionError::Password(e) => e.into(),
            SessionError::Storage(e) => e.into(),
        }
    }
}

/// Orchestrates login, logout, refresh and password change.
///
/// All session state lives on the user record: the single refresh-token slot
/// means at most one refresh token per user is valid at a time.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn UserStore>,
    tokens: TokenIssuer,
}

impl SessionManager {
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Verify credentials and start a new session, replacing any previous one
    pub async fn login(&self, request: LoginRequest) -> Result<SessionGrant, SessionError> {
        let username = request.username.as_deref().and_then(normalize_identifier);
        let email = request.email.as_deref().and_then(normalize_identifier);
        if username.is_none() && email.is_none() {
            return Err(SessionError::MissingIdentifier);
        }
        if request.password.is_empty() {
            return Err(SessionError::MissingPassword);
        }

        let Some(user) = self
            .store
            .find_by_identifier(username.as_deref(), email.as_deref())
            .await?
        else {
            verify_dummy_password(&request.password);
            warn!(
                "Login attempt for unknown user: {}",
                username.as_deref().or(email.as_deref()).unwrap_or_default()
            );
            return Err(SessionError::UnknownUser);
        };

        if !verify_password(&request.password, &user.password_hash)? {
            warn!("Invalid password for user: {}", user.username);
            return Err(SessionError::InvalidPassword);
        }

        let tokens = self.tokens.issue_pair(&user)?;
        self.store
            .set_refresh_token(user.id, Some(&tokens.refresh_token))
            .await?;

        info!("User {} logged in successfully", user.username);

        Ok(SessionGrant {
            user: UserView::from(&user),
            tokens,
        })
    }

    /// Clear the stored refresh token; every outstanding refresh token dies
    pub async fn logout(&self, user_id: Uuid) -> Result<(), SessionError> {
        self.store.set_refresh_token(user_id, None).await?;
        info!("User {} logged out", user_id);
        Ok(())
    }

    /// Exchange a refresh token for a new pair, rotating the stored token
    pub async fn refresh(&self, incoming: &str) -> Result<SessionGrant, SessionError> {
        let claims = self.tokens.verify_refresh(incoming).map_err(|e| match e {
            TokenError::Expired => SessionError::TokenExpired,
            _ => SessionError::InvalidToken,
        })?;

        let user = match self.store.get_user(claims.sub).await {
            Ok(user) => user,
            Err(StorageError::UserNotFound(_)) => {
                warn!("Refresh token for missing user {}", claims.sub);
                return Err(SessionError::InvalidToken);
            }
            Err(e) => return Err(e.into()),
        };

        let matches_stored = user
            .refresh_token
            .as_deref()
            .is_some_and(|stored| constant_time_eq(stored.as_bytes(), incoming.as_bytes()));
        if !matches_stored {
            warn!("Stale or reused refresh token for user {}", user.username);
            return Err(self.end_session_after_mismatch(user.id).await);
        }

        let tokens = self.tokens.issue_pair(&user)?;

        // Another request may have rotated between the read and this write
        let swapped = self
            .store
            .compare_and_swap_refresh_token(user.id, incoming, &tokens.refresh_token)
            .await?;
        if !swapped {
            warn!("Lost refresh rotation race for user {}", user.username);
            return Err(self.end_session_after_mismatch(user.id).await);
        }

        info!("Rotated refresh token for user {}", user.username);

        Ok(SessionGrant {
            user: UserView::from(&user),
            tokens,
        })
    }

    /// A presented token that no longer matches the slot ends the session:
    /// the slot is cleared so no outstanding refresh token stays usable.
    async fn end_session_after_mismatch(&self, user_id: Uuid) -> SessionError {
        match self.store.set_refresh_token(user_id, None).await {
            Ok(()) => {
                info!("Cleared refresh token for user {} after mismatch", user_id);
                SessionError::StaleRefreshToken
            }
            Err(e) => e.into(),
        }
    }

    /// Replace the password after re-verifying the old one.
    /// Existing sessions are left alone.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        if new_password.is_empty() {
            return Err(SessionError::MissingPassword);
        }

        let user = self.store.get_user(user_id).await?;
        if !verify_password(old_password, &user.password_hash)? {
            warn!("Invalid old password for user: {}", user.username);
            return Err(SessionError::IncorrectOldPassword);
        }

        if let Some(password_hash) = prepare_password_update(new_password, &user.password_hash)? {
            self.store
                .update_fields(
                    user_id,
                    UserPatch {
                        password_hash: Some(password_hash),
                        ..Default::default()
                    },
                )
                .await?;
        }

        info!("Password changed for user {}", user.username);
        Ok(())
    }
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
