/// Cookie Manager
///
/// Builds the three session cookies and their clearing counterparts.
/// `Authentication` and `Refresh` are HttpOnly. `RefreshExist` is readable by
/// the client and only says that a refresh is worth attempting.

use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpResponseBuilder;

use crate::auth::jwt::IssuedToken;
use crate::configuration::CookieSettings;

pub const ACCESS_COOKIE: &str = "Authentication";
pub const REFRESH_COOKIE: &str = "Refresh";
pub const REFRESH_EXIST_COOKIE: &str = "RefreshExist";

#[derive(Debug, Clone)]
pub struct CookieManager {
    domain: Option<String>,
    secure: bool,
}

/// The three cookies that are always set and cleared together
#[derive(Debug, Clone)]
pub struct SessionCookieSet {
    cookies: Vec<Cookie<'static>>,
}

impl SessionCookieSet {
    pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
        self.cookies.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        self.cookies.iter().find(|c| c.name() == name)
    }

    /// `Set-Cookie` header values
    pub fn header_values(&self) -> Vec<String> {
        self.cookies.iter().map(|c| c.to_string()).collect()
    }

    pub fn apply(&self, response: &mut HttpResponseBuilder) {
        for cookie in &self.cookies {
            response.cookie(cookie.clone());
        }
    }
}

impl CookieManager {
    pub fn new(domain: Option<String>, secure: bool) -> Self {
        Self { domain, secure }
    }

    pub fn from_settings(settings: &CookieSettings) -> Self {
        Self::new(settings.domain.clone(), settings.secure)
    }

    pub fn build_session_cookies(
        &self,
        access: &IssuedToken,
        refresh: &IssuedToken,
    ) -> SessionCookieSet {
        SessionCookieSet {
            cookies: vec![
                self.cookie(ACCESS_COOKIE, access.value.clone(), access.ttl_seconds, true),
                self.cookie(REFRESH_COOKIE, refresh.value.clone(), refresh.ttl_seconds, true),
                self.cookie(REFRESH_EXIST_COOKIE, "true".to_string(), refresh.ttl_seconds, false),
            ],
        }
    }

    /// Same names and flags, empty values, expiring immediately
    pub fn build_logout_cookies(&self) -> SessionCookieSet {
        SessionCookieSet {
            cookies: vec![
                self.cookie(ACCESS_COOKIE, String::new(), 0, true),
                self.cookie(REFRESH_COOKIE, String::new(), 0, true),
                self.cookie(REFRESH_EXIST_COOKIE, String::new(), 0, false),
            ],
        }
    }

    fn cookie(
        &self,
        name: &'static str,
        value: String,
        max_age_seconds: i64,
        http_only: bool,
    ) -> Cookie<'static> {
        let mut cookie = Cookie::build(name, value)
            .path("/")
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(max_age_seconds))
            .finish();
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }
}
