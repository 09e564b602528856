use super::{decode, with_token, ClientError};
use crate::api::{CreateTrackerRequest, DeleteResponse, TrackerResponse, UpdateTrackerRequest};
use crate::TRACKER_API;

// * CRUD .....................................................................

pub async fn fetch_trackers(base_url: &str, token: &str) -> Result<Vec<TrackerResponse>, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TRACKER_API}", base_url);
    let response = with_token(client.get(url), token).send().await?;
    decode(response).await
}

pub async fn fetch_tracker(base_url: &str, token: &str, id: i32) -> Result<TrackerResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TRACKER_API}/{}", base_url, id);
    let response = with_token(client.get(url), token).send().await?;
    decode(response).await
}

pub async fn create_tracker(
    base_url: &str,
    token: &str,
    tracker: &CreateTrackerRequest,
) -> Result<TrackerResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TRACKER_API}", base_url);
    let response = with_token(client.post(url), token).json(tracker).send().await?;
    decode(response).await
}

pub async fn update_tracker(
    base_url: &str,
    token: &str,
    id: i32,
    tracker: &UpdateTrackerRequest,
) -> Result<TrackerResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TRACKER_API}/{}", base_url, id);
    let response = with_token(client.put(url), token).json(tracker).send().await?;
    decode(response).await
}

pub async fn delete_tracker(base_url: &str, token: &str, id: i32) -> Result<DeleteResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TRACKER_API}/{}", base_url, id);
    let response = with_token(client.delete(url), token).send().await?;
    decode(response).await
}

// * Timing ...................................................................

pub async fn start_tracker(base_url: &str, token: &str, id: i32) -> Result<TrackerResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TRACKER_API}/{}/start", base_url, id);
    let response = with_token(client.patch(url), token).send().await?;
    decode(response).await
}

pub async fn stop_tracker(base_url: &str, token: &str, id: i32) -> Result<TrackerResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TRACKER_API}/{}/stop", base_url, id);
    let response = with_token(client.patch(url), token).send().await?;
    decode(response).await
}

/// Folds the running session's whole seconds into `totalTime` without
/// stopping it.
pub async fn sync_tracker(base_url: &str, token: &str, id: i32) -> Result<TrackerResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TRACKER_API}/{}/sync", base_url, id);
    let response = with_token(client.post(url), token).send().await?;
    decode(response).await
}
