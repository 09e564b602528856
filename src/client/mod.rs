//! Async HTTP client for the TaskFlow API.
//!
//! Every call takes the server's base URL and, for protected routes, the
//! session token returned by [`auth::login`] or [`auth::signup`]. The token is
//! sent as `Authorization: Bearer`.

pub mod auth;
pub mod notes;
pub mod tasks;
pub mod tracker;

pub use crate::api::{
    AuthResponse, CreateNoteRequest, CreateTaskRequest, CreateTrackerRequest, DeleteResponse,
    FieldError, LoginRequest, MeResponse, MessageResponse, SignupRequest, TrackerResponse,
    UpdateNoteRequest, UpdateTaskRequest, UpdateTrackerRequest,
};
pub use crate::tables::{Note, Session, Task, UserResponse};

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unexpected server error: {0}")]
    ServerError(String),
}

// Either `{"message": ...}` or `{"errors": [...]}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

impl ErrorBody {
    fn describe(self, status: StatusCode) -> String {
        if let Some(message) = self.message {
            return message;
        }
        if !self.errors.is_empty() {
            return self
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join("; ");
        }
        status.to_string()
    }
}

pub(crate) fn with_token(request: RequestBuilder, token: &str) -> RequestBuilder {
    request.bearer_auth(token)
}

/// Turns a response into `T`, or into the `ClientError` matching its status.
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let text = response.text().await?;
    let message = serde_json::from_str::<ErrorBody>(&text)
        .unwrap_or_default()
        .describe(status);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ClientError::BadRequest(message)
        }
        StatusCode::CONFLICT => ClientError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited(message),
        _ => ClientError::ServerError(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_prefers_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"Invalid credentials"}"#).unwrap();
        assert_eq!(body.describe(StatusCode::UNAUTHORIZED), "Invalid credentials");
    }

    #[test]
    fn test_error_body_joins_field_errors() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"errors":[{"field":"email","message":"Must be a valid email"},{"field":"password","message":"Password must be at least 6 characters"}]}"#,
        )
        .unwrap();
        assert_eq!(
            body.describe(StatusCode::BAD_REQUEST),
            "email: Must be a valid email; password: Password must be at least 6 characters"
        );
    }

    #[test]
    fn test_error_body_falls_back_to_status() {
        assert_eq!(
            ErrorBody::default().describe(StatusCode::BAD_GATEWAY),
            "502 Bad Gateway"
        );
    }
}
