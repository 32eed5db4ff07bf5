mod cookies;
mod middleware;
mod password;
mod session;
mod tokens;

pub use cookies::{
    with_session_cookies, without_session_cookies, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME,
};
pub use middleware::{auth_middleware, extract_access_token, AuthenticatedUser};
pub use password::{hash_password, prepare_password_update, verify_password, PasswordError};
pub use session::{constant_time_eq, LoginRequest, SessionError, SessionGrant, SessionManager};
pub use tokens::{AccessClaims, RefreshClaims, TokenConfig, TokenError, TokenIssuer, TokenPair};
