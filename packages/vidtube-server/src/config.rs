use std::env;
use std::path::PathBuf;

/// Minimum accepted length for token signing secrets
const MIN_SECRET_LEN: usize = 32;

/// Upper bound for token lifetimes (ten years)
const MAX_TOKEN_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

const MEDIA_ENV_VARS: [&str; 3] = [
    "CLOUDINARY_CLOUD_NAME",
    "CLOUDINARY_API_KEY",
    "CLOUDINARY_API_SECRET",
];

/// Which user store backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Credentials for the media host
#[derive(Debug, Clone)]
pub struct MediaHostConfig {
    pub base_url: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind_addr: String,
    /// User store backend
    pub store_backend: StoreBackend,
    /// PostgreSQL database URL (required for the postgres backend)
    pub database_url: Option<String>,
    /// Secret for signing access tokens
    pub access_token_secret: String,
    /// Secret for signing refresh tokens
    pub refresh_token_secret: String,
    /// Access token lifetime in seconds
    pub access_token_ttl_seconds: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl_seconds: u64,
    /// Mark credential cookies Secure
    pub cookie_secure: bool,
    /// Directory for temporary uploaded files
    pub upload_directory: PathBuf,
    /// Maximum multipart body size in bytes
    pub max_upload_size: u64,
    /// Maximum JSON body size in bytes
    pub max_body_size: usize,
    /// Media host credentials; only `serve` needs them
    pub media: Option<MediaHostConfig>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let store_backend = match env::var("USER_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "USER_STORE must be 'postgres' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        // SECURITY: No default signing secrets
        let access_token_secret = required_secret("ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = required_secret("REFRESH_TOKEN_SECRET")?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
            ));
        }

        let media = if MEDIA_ENV_VARS.iter().any(|name| env::var(name).is_ok()) {
            Some(MediaHostConfig {
                base_url: env::var("CLOUDINARY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.cloudinary.com".to_string()),
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            })
        } else {
            None
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            store_backend,
            database_url,
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_seconds: validate_ttl(
                "ACCESS_TOKEN_TTL_SECONDS",
                parse_or("ACCESS_TOKEN_TTL_SECONDS", 900)?,
            )?,
            refresh_token_ttl_seconds: validate_ttl(
                "REFRESH_TOKEN_TTL_SECONDS",
                parse_or("REFRESH_TOKEN_TTL_SECONDS", 864_000)?,
            )?,
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(true),
            upload_directory: env::var("UPLOAD_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vidtube-uploads")),
            max_upload_size: parse_or("MAX_UPLOAD_SIZE", 10 * 1024 * 1024)?,
            max_body_size: parse_or("MAX_BODY_SIZE", 16 * 1024)?,
            media,
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Media host credentials, required to run the server
    pub fn media_host(&self) -> Result<&MediaHostConfig, ConfigError> {
        self.media
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar(MEDIA_ENV_VARS[0].to_string()))
    }
}

fn validate_ttl(name: &str, seconds: u64) -> Result<u64, ConfigError> {
    if seconds == 0 || seconds > MAX_TOKEN_TTL_SECONDS {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be between 1 and {} seconds",
            name, MAX_TOKEN_TTL_SECONDS
        )));
    }
    Ok(seconds)
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn required_secret(name: &str) -> Result<String, ConfigError> {
    let secret = required(name)?;
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be at least {} characters",
            name, MIN_SECRET_LEN
        )));
    }
    Ok(secret)
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a valid number", name))),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
