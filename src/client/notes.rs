use super::{decode, with_token, ClientError};
use crate::api::{CreateNoteRequest, DeleteResponse, UpdateNoteRequest};
use crate::tables::Note;
use crate::NOTES_API;

/// Lists notes, newest edit first, optionally only those of `note_type`.
pub async fn fetch_notes(
    base_url: &str,
    token: &str,
    note_type: Option<&str>,
) -> Result<Vec<Note>, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{NOTES_API}", base_url);
    let mut request = with_token(client.get(url), token);
    if let Some(note_type) = note_type {
        request = request.query(&[("type", note_type)]);
    }
    decode(request.send().await?).await
}

pub async fn fetch_note(base_url: &str, token: &str, id: i32) -> Result<Note, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{NOTES_API}/{}", base_url, id);
    let response = with_token(client.get(url), token).send().await?;
    decode(response).await
}

pub async fn search_notes(base_url: &str, token: &str, query: &str) -> Result<Vec<Note>, ClientError> {
    let client = reqwest::Client::new();
    let url = format!(
        "{}/{NOTES_API}/search/{}",
        base_url,
        urlencoding::encode(query)
    );
    let response = with_token(client.get(url), token).send().await?;
    decode(response).await
}

pub async fn create_note(
    base_url: &str,
    token: &str,
    note: &CreateNoteRequest,
) -> Result<Note, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{NOTES_API}", base_url);
    let response = with_token(client.post(url), token).json(note).send().await?;
    decode(response).await
}

pub async fn update_note(
    base_url: &str,
    token: &str,
    id: i32,
    note: &UpdateNoteRequest,
) -> Result<Note, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{NOTES_API}/{}", base_url, id);
    let response = with_token(client.put(url), token).json(note).send().await?;
    decode(response).await
}

pub async fn delete_note(base_url: &str, token: &str, id: i32) -> Result<DeleteResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{NOTES_API}/{}", base_url, id);
    let response = with_token(client.delete(url), token).send().await?;
    decode(response).await
}
