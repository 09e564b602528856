use super::error::{ApiError, Validator};
use super::state::AppState;
use crate::auth::token::TOKEN_TTL_MINUTES;
use crate::auth::{password, TokenError, TOKEN_COOKIE};
use crate::schema::users;
use crate::tables::{NewUser, User, UserResponse};
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use diesel::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{info, warn};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid");
}

// Missing fields deserialize as empty strings so they fail validation (400)
// instead of the JSON extractor (422).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

/// The authenticated caller. Extracting it is what makes a route protected.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or(ApiError::Unauthorized("No auth token provided"))?;

        let claims = state
            .auth
            .keys
            .verify(&token, state.clock.now())
            .map_err(|err| match err {
                TokenError::Expired => ApiError::Unauthorized("Token expired"),
                TokenError::Invalid(_) => ApiError::Unauthorized("Invalid token"),
            })?;

        let mut conn = state.pool.get()?;
        let user = users::table
            .find(claims.user_id)
            .first::<User>(&mut conn)
            .optional()?
            .ok_or(ApiError::NotFound("User"))?;

        Ok(AuthUser(user))
    }
}

/// The `token` cookie wins; `Authorization: Bearer` is the fallback for
/// clients that cannot hold cookies.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// The peer address, or the first `X-Forwarded-For` hop when the server sits
/// behind a trusted proxy.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let cookie = Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::minutes(TOKEN_TTL_MINUTES));

    if state.auth.secure_cookies {
        cookie.secure(true).same_site(SameSite::None).build()
    } else {
        cookie.same_site(SameSite::Lax).build()
    }
}

fn issue_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    state
        .auth
        .keys
        .issue(user.id, state.clock.now())
        .map_err(ApiError::internal)
}

async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim().to_string();

    Validator::new()
        .check(EMAIL_RE.is_match(&email), "email", "Must be a valid email")
        .check(
            username.chars().count() >= 3,
            "username",
            "Username must be at least 3 characters",
        )
        .check(
            payload.password.chars().count() >= 6,
            "password",
            "Password must be at least 6 characters",
        )
        .finish()?;

    let mut conn = state.pool.get()?;

    let username_taken: i64 = users::table
        .filter(users::username.eq(&username))
        .count()
        .get_result(&mut conn)?;
    if username_taken > 0 {
        return Err(ApiError::Conflict("Username already taken"));
    }

    let email_taken: i64 = users::table
        .filter(users::email.eq(&email))
        .count()
        .get_result(&mut conn)?;
    if email_taken > 0 {
        return Err(ApiError::Conflict("Email already registered"));
    }

    let password_hash = password::hash_password(&payload.password).map_err(ApiError::internal)?;

    let user = diesel::insert_into(users::table)
        .values(&NewUser {
            email: &email,
            username: &username,
            password_hash: &password_hash,
            created_at: state.now(),
        })
        .get_result::<User>(&mut conn)?;

    let token = issue_token(&state, &user)?;
    info!("Signed up user {} ({})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(&state, token.clone())),
        Json(AuthResponse {
            user: UserResponse::from(&user),
            token,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let client = client_key(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.auth.trust_proxy,
    );
    if !state.login_limiter.hit(&client, state.clock.now()) {
        warn!("Login rate limit exceeded for {}", client);
        return Err(ApiError::TooManyRequests);
    }

    let username = payload.username.trim();
    Validator::new()
        .check(!username.is_empty(), "username", "Username is required")
        .check(!payload.password.is_empty(), "password", "Password is required")
        .finish()?;

    let mut conn = state.pool.get()?;
    let user = users::table
        .filter(users::username.eq(username))
        .first::<User>(&mut conn)
        .optional()?;

    let Some(user) = user else {
        warn!("Login attempt for unknown user {:?}", username);
        return Err(ApiError::Unauthorized("Invalid credentials"));
    };

    if !password::verify_password(&payload.password, &user.password_hash)
        .map_err(ApiError::internal)?
    {
        warn!("Wrong password for user {}", user.id);
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    let token = issue_token(&state, &user)?;
    info!("User {} logged in", user.id);

    Ok((
        jar.add(session_cookie(&state, token.clone())),
        Json(AuthResponse {
            user: UserResponse::from(&user),
            token,
        }),
    ))
}

/// Tokens are stateless, so this only tells the browser to drop its cookie.
async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(Cookie::build(TOKEN_COOKIE).path("/")),
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

async fn me(AuthUser(user): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        message: "Authorized".to_string(),
        user: UserResponse::from(&user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_token_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(token_from_headers(&headers), None);

        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_client_key_uses_peer_by_default() {
        let peer: SocketAddr = "192.168.1.20:50000".parse().unwrap();
        let mut headers = HeaderMap::new();

        assert_eq!(client_key(&headers, Some(peer), false), "192.168.1.20");
        assert_eq!(client_key(&headers, None, false), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer), false), "192.168.1.20");
    }

    #[test]
    fn test_client_key_behind_trusted_proxy() {
        let peer: SocketAddr = "10.0.0.1:50000".parse().unwrap();
        let mut headers = HeaderMap::new();

        assert_eq!(client_key(&headers, Some(peer), true), "10.0.0.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.9");
    }

    #[test]
    fn test_email_pattern() {
        assert!(EMAIL_RE.is_match("ada@example.com"));
        assert!(!EMAIL_RE.is_match("ada@example"));
        assert!(!EMAIL_RE.is_match("not an email"));
    }
}
