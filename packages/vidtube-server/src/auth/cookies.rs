use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::tokens::TokenPair;

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

fn credential_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Set both credential cookies from a freshly issued pair
pub fn with_session_cookies(jar: CookieJar, tokens: &TokenPair, secure: bool) -> CookieJar {
    jar.add(credential_cookie(
        ACCESS_COOKIE_NAME,
        tokens.access_token.clone(),
        secure,
    ))
    .add(credential_cookie(
        REFRESH_COOKIE_NAME,
        tokens.refresh_token.clone(),
        secure,
    ))
}

fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = credential_cookie(name, String::new(), secure);
    cookie.make_removal();
    cookie
}

/// Expire both credential cookies, whether or not the request carried them
pub fn without_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(expired_cookie(ACCESS_COOKIE_NAME, secure))
        .add(expired_cookie(REFRESH_COOKIE_NAME, secure))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[test]
    fn test_session_cookies_are_http_only() {
        let jar = with_session_cookies(CookieJar::new(), &pair(), true);

        let access = jar.get(ACCESS_COOKIE_NAME).unwrap();
        assert_eq!(access.value(), "access");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));

        let refresh = jar.get(REFRESH_COOKIE_NAME).unwrap();
        assert_eq!(refresh.value(), "refresh");
    }

    #[test]
    fn test_removal_expires_cookies() {
        let jar = with_session_cookies(CookieJar::new(), &pair(), false);
        let jar = without_session_cookies(jar, false);

        for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
            let cookie = jar.get(name).unwrap();
            assert_eq!(cookie.value(), "");
            assert!(cookie.max_age().is_some_and(|age| age.is_zero()));
        }
    }
}
