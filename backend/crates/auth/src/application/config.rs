//! Application Configuration
//!
//! Configuration for the Auth application layer.

use platform::cookie::CookieConfig;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// One day, in seconds
const ONE_DAY_SECS: i64 = 86_400;

/// Auth application configuration
///
/// Age thresholds are signed second counts; zero or negative disables the
/// corresponding rule.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session cookie name
    pub session_cookie_name: String,
    /// Freshness threshold used when a guard call does not set one
    pub fresh_age: i64,
    /// Refresh window: younger sessions are returned unchanged
    pub update_age: i64,
    /// Redirect target for denials when the guard call names none
    pub default_redirect_url: Option<String>,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Minimum password length, in characters
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "auth.session_token".to_string(),
            fresh_age: ONE_DAY_SECS,
            update_age: ONE_DAY_SECS,
            default_redirect_url: None,
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            min_password_length: 8,
        }
    }
}

impl AuthConfig {
    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Default::default()
        }
    }

    /// Cookie settings for the session cookie
    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig {
            name: self.session_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
        }
    }
}
