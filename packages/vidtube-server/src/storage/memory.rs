use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::traits::{StorageError, StorageResult};
use super::users::{NewUser, User, UserPatch, UserStore};

/// In-process user store for development and tests.
///
/// Every operation takes the lock once, so the refresh-token compare-and-swap
/// is atomic with respect to other writers.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }
}

fn conflicts(existing: &User, username: Option<&str>, email: Option<&str>) -> bool {
    username.is_some_and(|u| existing.username == u) || email.is_some_and(|e| existing.email == e)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let mut users = self.users.write();

        if users
            .values()
            .any(|u| conflicts(u, Some(&user.username), Some(&user.email)))
        {
            return Err(StorageError::DuplicateUser(user.username));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar: user.avatar,
            cover_image: user.cover_image,
            watch_history: Vec::new(),
            password_hash: user.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> StorageResult<User> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or(StorageError::UserNotFound(id))
    }

    async fn find_by_identifier(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StorageResult<Option<User>> {
        let users = self.users.read();
        let mut matches: Vec<&User> = users
            .values()
            .filter(|u| conflicts(u, username, email))
            .collect();
        matches.sort_by_key(|u| u.created_at);

        Ok(matches.first().map(|u| (*u).clone()))
    }

    async fn update_fields(&self, id: Uuid, patch: UserPatch) -> StorageResult<User> {
        let mut users = self.users.write();

        if let Some(email) = patch.email.as_deref() {
            if users.values().any(|u| u.id != id && u.email == email) {
                return Err(StorageError::DuplicateUser(email.to_string()));
            }
        }

        let user = users.get_mut(&id).ok_or(StorageError::UserNotFound(id))?;
        if let Some(full_name) = patch.full_name {
            user.full_name = full_name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(avatar) = patch.avatar {
            user.avatar = avatar;
        }
        if let Some(cover_image) = patch.cover_image {
            user.cover_image = cover_image;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StorageResult<()> {
        let mut users = self.users.write();
        let user = users.get_mut(&id).ok_or(StorageError::UserNotFound(id))?;
        user.refresh_token = token.map(str::to_string);
        Ok(())
    }

    async fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> StorageResult<bool> {
        let mut users = self.users.write();
        let user = users.get_mut(&id).ok_or(StorageError::UserNotFound(id))?;

        if user.refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }
        user.refresh_token = Some(new.to_string());
        Ok(true)
    }
}
