use crate::auth::AuthConfig;
use clap::Args;
use std::net::SocketAddr;

/// Server configuration. Every flag can also come from the environment (or a
/// `.env` file loaded before parsing).
#[derive(Args, Debug, Clone)]
pub struct ServerSettings {
    /// The address to bind to
    #[arg(short, long, env = "TASKFLOW_ADDR", default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,

    /// SQLite database file; created and migrated on startup
    #[arg(long, env = "DATABASE_URL", default_value = "taskflow.db")]
    pub database_url: String,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Send the token cookie as `Secure; SameSite=None` (needed when the
    /// frontend is served from another site over HTTPS)
    #[arg(long, env = "COOKIE_SECURE")]
    pub secure_cookies: bool,

    /// Rate-limit logins by the first `X-Forwarded-For` hop. Enable only
    /// behind a reverse proxy that sets the header itself.
    #[arg(long, env = "TRUST_PROXY")]
    pub trust_proxy: bool,

    /// Frontend origins allowed to call the API with credentials
    #[arg(
        long = "allow-origin",
        env = "FRONTEND_URL",
        value_delimiter = ',',
        default_value = "http://localhost:5173"
    )]
    pub allowed_origins: Vec<String>,
}

impl ServerSettings {
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.jwt_secret.as_bytes(), self.secure_cookies)
            .trusting_proxy(self.trust_proxy)
    }
}
