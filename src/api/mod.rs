use crate::clock::SystemClock;
use crate::db::init_pool;
use crate::settings::ServerSettings;
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod auth;
mod error;
mod notes;
mod owned;
mod state;
mod tasks;
mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AuthResponse, AuthUser, LoginRequest, MeResponse, MessageResponse, SignupRequest};
pub use error::{ApiError, FieldError};
pub use notes::{
    canonical_category, canonical_type, CreateNoteRequest, ListNotesParams, UpdateNoteRequest,
    CATEGORIES, NOTE_TYPES,
};
pub use state::{AppState, Pool};
pub use tasks::{CreateTaskRequest, DeleteResponse, UpdateTaskRequest};
pub use tracker::{CreateTrackerRequest, TrackerResponse, UpdateTrackerRequest};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "TaskFlow!" }))
        .merge(auth::create_router())
        .merge(tasks::create_router())
        .merge(notes::create_router())
        .merge(tracker::create_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Credentialed CORS for the listed frontend origins.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| origin.trim().parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

pub async fn serve(settings: ServerSettings) -> anyhow::Result<()> {
    let pool = init_pool(&settings.database_url)?;
    let state = AppState::new(pool, settings.auth_config(), Arc::new(SystemClock));
    let app = create_router(state).layer(cors_layer(&settings.allowed_origins)?);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use super::test_support::setup_test_state;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_answers() {
        let (state, _clock, _dir) = setup_test_state();
        let response = create_router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"TaskFlow!");
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_token() {
        let (state, _clock, _dir) = setup_test_state();
        let app = create_router(state);

        for uri in ["/api/tasks", "/api/notes", "/api/tracker", "/auth/me"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[test]
    fn test_cors_rejects_malformed_origin() {
        assert!(cors_layer(&["http://localhost:5173".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
