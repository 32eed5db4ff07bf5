use clap::Subcommand;
use rand::Rng;
use std::sync::Arc;

use crate::auth::hash_password;
use crate::storage::{normalize_identifier, User, UserPatch, UserStore};

/// User management subcommands
#[derive(Subcommand)]
pub enum UserCommands {
    /// Show user details
    Show {
        /// Username or email address
        identifier: String,
    },

    /// Reset a user's password
    ResetPassword {
        /// Username
        #[arg(short, long)]
        username: String,

        /// New password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Clear the stored refresh token, ending the user's session
    RevokeSession {
        /// Username
        #[arg(short, long)]
        username: String,
    },
}

impl UserCommands {
    /// Execute the user command
    pub async fn execute(
        self,
        user_store: Arc<dyn UserStore>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match self {
            UserCommands::Show { identifier } => {
                let ident = normalize_identifier(&identifier).ok_or("Identifier is empty")?;
                let user = lookup(user_store.as_ref(), Some(&ident), Some(&ident)).await?;

                println!("User Details:");
                println!("  ID:         {}", user.id);
                println!("  Username:   {}", user.username);
                println!("  Email:      {}", user.email);
                println!("  Name:       {}", user.full_name);
                println!("  Avatar:     {}", user.avatar);
                println!(
                    "  Cover:      {}",
                    if user.cover_image.is_empty() { "-" } else { &user.cover_image }
                );
                println!("  Watched:    {} videos", user.watch_history.len());
                println!(
                    "  Session:    {}",
                    if user.refresh_token.is_some() { "Active" } else { "None" }
                );
                println!("  Created:    {}", user.created_at);
            }

            UserCommands::ResetPassword { username, password } => {
                let username = normalize_identifier(&username).ok_or("Username is empty")?;
                let user = lookup(user_store.as_ref(), Some(&username), None).await?;
                let password = password.unwrap_or_else(generate_secure_password);
                let password_hash =
                    hash_password(&password).map_err(|e| format!("Failed to hash password: {}", e))?;

                user_store
                    .update_fields(
                        user.id,
                        UserPatch {
                            password_hash: Some(password_hash),
                            ..Default::default()
                        },
                    )
                    .await?;

                println!("✅ Password reset successfully!");
                println!();
                println!("   Username:     {}", user.username);
                println!("   New Password: {}", password);
                println!();
                println!("⚠️  Please securely share the new password with the user.");
            }

            UserCommands::RevokeSession { username } => {
                let username = normalize_identifier(&username).ok_or("Username is empty")?;
                let user = lookup(user_store.as_ref(), Some(&username), None).await?;
                user_store.set_refresh_token(user.id, None).await?;

                println!("✅ Session revoked for {}.", user.username);
            }
        }

        Ok(())
    }
}

async fn lookup(
    user_store: &dyn UserStore,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<User, Box<dyn std::error::Error>> {
    user_store
        .find_by_identifier(username, email)
        .await?
        .ok_or_else(|| {
            format!(
                "User not found: {}",
                username.or(email).unwrap_or_default()
            )
            .into()
        })
}

/// Generate a secure random password
fn generate_secure_password() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789!@#$%&*";
    let mut rng = rand::thread_rng();

    (0..16)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::storage::{MemoryUserStore, NewUser};

    async fn store_with_bob() -> (Arc<dyn UserStore>, uuid::Uuid) {
        let store = MemoryUserStore::new();
        let user = store
            .create_user(NewUser {
                username: "bob".to_string(),
                email: "bob@x.com".to_string(),
                full_name: "Bob".to_string(),
                avatar: "https://media.test/bob.png".to_string(),
                cover_image: String::new(),
                password_hash: hash_password("old-password").unwrap(),
            })
            .await
            .unwrap();
        store
            .set_refresh_token(user.id, Some("refresh"))
            .await
            .unwrap();
        let store: Arc<dyn UserStore> = Arc::new(store);
        (store, user.id)
    }

    #[test]
    fn test_generated_password() {
        let password = generate_secure_password();
        assert_eq!(password.chars().count(), 16);
        assert_ne!(password, generate_secure_password());
    }

    #[tokio::test]
    async fn test_reset_password() {
        let (store, id) = store_with_bob().await;

        UserCommands::ResetPassword {
            username: "Bob".to_string(),
            password: Some("new-password".to_string()),
        }
        .execute(store.clone())
        .await
        .unwrap();

        let user = store.get_user(id).await.unwrap();
        assert!(verify_password("new-password", &user.password_hash).unwrap());
        assert!(!verify_password("old-password", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_revoke_session() {
        let (store, id) = store_with_bob().await;

        UserCommands::RevokeSession {
            username: "bob".to_string(),
        }
        .execute(store.clone())
        .await
        .unwrap();

        assert!(store.get_user(id).await.unwrap().refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (store, _) = store_with_bob().await;

        let result = UserCommands::Show {
            identifier: "nobody".to_string(),
        }
        .execute(store)
        .await;
        assert!(result.is_err());
    }
}
