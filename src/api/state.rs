use crate::auth::{AuthConfig, RateLimiter};
use crate::clock::Clock;
pub use crate::db::Pool;
use chrono::NaiveDateTime;
use std::sync::Arc;

// Shared state
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<Pool>,
    pub auth: Arc<AuthConfig>,
    pub clock: Arc<dyn Clock>,
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(pool: Pool, auth: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool: Arc::new(pool),
            auth: Arc::new(auth),
            clock,
            login_limiter: Arc::new(RateLimiter::for_login()),
        }
    }

    /// Current instant as stored in the database (UTC, no offset).
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now().naive_utc()
    }
}
