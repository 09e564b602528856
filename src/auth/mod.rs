//! Credential primitives used by the `/auth` routes and the request extractor.

pub mod limiter;
pub mod password;
pub mod token;

pub use limiter::RateLimiter;
pub use token::{Claims, TokenError, TokenKeys};

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";

/// Everything the auth layer needs besides the database and the clock.
#[derive(Clone)]
pub struct AuthConfig {
    pub keys: TokenKeys,
    /// Mark the token cookie `Secure; SameSite=None` for cross-site frontends.
    pub secure_cookies: bool,
    /// Take the client address from `X-Forwarded-For` instead of the peer.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_proxy: bool,
}

impl AuthConfig {
    pub fn new(secret: &[u8], secure_cookies: bool) -> Self {
        Self {
            keys: TokenKeys::new(secret),
            secure_cookies,
            trust_proxy: false,
        }
    }

    pub fn trusting_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }
}
