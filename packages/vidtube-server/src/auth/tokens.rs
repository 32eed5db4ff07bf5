use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::storage::User;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    /// Random per issue so two refresh tokens minted in the same second differ
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Access + refresh token pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signing secrets and lifetimes, fixed for the life of the process
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
            access_ttl: Duration::seconds(config.access_token_ttl_seconds as i64),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl_seconds as i64),
        }
    }
}

/// Token errors
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token is invalid")]
    Invalid,
    #[error("Token has expired")]
    Expired,
    #[error("Failed to create token: {0}")]
    Creation(String),
}

/// Issues and verifies HS256 access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    config: TokenConfig,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    /// Sign an access token embedding the user's denormalized profile fields
    pub fn issue_access(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            iat: now.timestamp(),
            exp: (now + self.config.access_ttl).timestamp(),
        };
        sign(&claims, &self.config.access_secret)
    }

    /// Sign a refresh token embedding only the user id
    pub fn issue_refresh(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user.id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + self.config.refresh_ttl).timestamp(),
        };
        sign(&claims, &self.config.refresh_secret)
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(user)?,
            refresh_token: self.issue_refresh(user)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify(token, &self.config.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify(token, &self.config.refresh_secret)
    }
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, TokenError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Creation(e.to_string()))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })
}
