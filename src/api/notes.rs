use super::auth::AuthUser;
use super::error::{ApiError, Validator};
use super::owned::{fetch_owned, remove_owned};
use super::state::AppState;
use super::tasks::DeleteResponse;
use crate::tables::{NewNote, Note, NoteChanges};
use crate::NOTES_API;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CATEGORIES: [&str; 5] = ["General", "Work", "Personal", "Ideas", "Archive"];
pub const NOTE_TYPES: [&str; 2] = ["regular", "sticky"];

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_TYPE: &str = "regular";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub note_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub note_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListNotesParams {
    #[serde(rename = "type")]
    pub note_type: Option<String>,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{NOTES_API}").as_str(),
            get(list_notes).post(create_note),
        )
        .route(
            format!("/{NOTES_API}/search/:query").as_str(),
            get(search_notes),
        )
        .route(
            format!("/{NOTES_API}/:id").as_str(),
            get(get_note).put(update_note).delete(delete_note),
        )
}

/// Matches a category case-insensitively and returns its canonical spelling.
pub fn canonical_category(category: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(category.trim()))
}

pub fn canonical_type(note_type: &str) -> Option<&'static str> {
    NOTE_TYPES
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(note_type.trim()))
}

fn title_or_default(title: &str) -> String {
    match title.trim() {
        "" => DEFAULT_TITLE.to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn load_notes(
    conn: &mut SqliteConnection,
    owner_id: i32,
    note_type: Option<&str>,
) -> QueryResult<Vec<Note>> {
    use crate::schema::notes;

    let mut query = notes::table
        .filter(notes::user_id.eq(owner_id))
        .order((notes::updated_at.desc(), notes::id.desc()))
        .into_boxed();
    if let Some(kind) = note_type {
        query = query.filter(notes::note_type.eq(kind));
    }
    query.load::<Note>(conn)
}

async fn list_notes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListNotesParams>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let note_type = match params.note_type.as_deref() {
        None => None,
        Some(requested) => Some(canonical_type(requested).ok_or_else(|| {
            ApiError::Validation(vec![super::error::FieldError {
                field: "type".to_string(),
                message: "Type must be \"regular\" or \"sticky\"".to_string(),
            }])
        })?),
    };

    let mut conn = state.pool.get()?;
    Ok(Json(load_notes(&mut conn, user.id, note_type)?))
}

async fn get_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(note_id): Path<i32>,
) -> Result<Json<Note>, ApiError> {
    let mut conn = state.pool.get()?;
    Ok(Json(fetch_owned::<Note>(&mut conn, user.id, note_id)?))
}

async fn create_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    use crate::schema::notes;

    let category = match payload.category.as_deref().map(str::trim) {
        None | Some("") => Some(DEFAULT_CATEGORY),
        Some(requested) => canonical_category(requested),
    };
    let note_type = match payload.note_type.as_deref().map(str::trim) {
        None | Some("") => Some(DEFAULT_TYPE),
        Some(requested) => canonical_type(requested),
    };
    Validator::new()
        .check(category.is_some(), "category", "Unknown category")
        .check(note_type.is_some(), "type", "Type must be \"regular\" or \"sticky\"")
        .finish()?;

    let title = title_or_default(&payload.title);
    let now = state.now();
    let mut conn = state.pool.get()?;

    let note = diesel::insert_into(notes::table)
        .values(&NewNote {
            title: &title,
            content: &payload.content,
            category: category.unwrap_or(DEFAULT_CATEGORY),
            note_type: note_type.unwrap_or(DEFAULT_TYPE),
            user_id: user.id,
            created_at: now,
            updated_at: now,
        })
        .get_result::<Note>(&mut conn)?;

    debug!("User {} created {} note {}", user.id, note.note_type, note.id);
    Ok((StatusCode::CREATED, Json(note)))
}

async fn update_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(note_id): Path<i32>,
    Json(payload): Json<UpdateNoteRequest>,
) -> Result<Json<Note>, ApiError> {
    use crate::schema::notes;

    let category = payload.category.as_deref().map(canonical_category);
    let note_type = payload.note_type.as_deref().map(canonical_type);
    Validator::new()
        .check(category != Some(None), "category", "Unknown category")
        .check(note_type != Some(None), "type", "Type must be \"regular\" or \"sticky\"")
        .finish()?;

    let changes = NoteChanges {
        title: payload.title.as_deref().map(title_or_default),
        content: payload.content,
        category: category.flatten().map(str::to_string),
        note_type: note_type.flatten().map(str::to_string),
        updated_at: state.now(),
    };

    let mut conn = state.pool.get()?;
    let existing = fetch_owned::<Note>(&mut conn, user.id, note_id)?;

    let note = diesel::update(notes::table.find(existing.id))
        .set(&changes)
        .get_result::<Note>(&mut conn)?;

    Ok(Json(note))
}

async fn delete_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(note_id): Path<i32>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mut conn = state.pool.get()?;
    remove_owned::<Note>(&mut conn, user.id, note_id)?;

    Ok(Json(DeleteResponse {
        message: "Note deleted successfully".to_string(),
        id: note_id,
    }))
}

// Filtering happens here rather than in SQL so matching is Unicode-aware and
// `%`/`_` in the query are taken literally.
async fn search_notes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(query): Path<String>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let mut conn = state.pool.get()?;
    let matches = load_notes(&mut conn, user.id, None)?
        .into_iter()
        .filter(|note| note.matches(&query))
        .collect();

    Ok(Json(matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{insert_user, setup_test_state};
    use chrono::Duration;

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_category("work"), Some("Work"));
        assert_eq!(canonical_category(" Ideas "), Some("Ideas"));
        assert_eq!(canonical_category("Recipes"), None);
        assert_eq!(canonical_type("STICKY"), Some("sticky"));
        assert_eq!(canonical_type("pinned"), None);
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let (state, _clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");

        let (status, Json(note)) = create_note(
            State(state),
            AuthUser(user),
            Json(CreateNoteRequest::default()),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(note.title, "Untitled");
        assert_eq!(note.content, "");
        assert_eq!(note.category, "General");
        assert_eq!(note.note_type, "regular");
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp_and_keeps_other_fields() {
        let (state, clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");

        let (_, Json(note)) = create_note(
            State(state.clone()),
            AuthUser(user.clone()),
            Json(CreateNoteRequest {
                title: "Plan".to_string(),
                content: "Draft".to_string(),
                category: Some("Work".to_string()),
                note_type: Some("sticky".to_string()),
            }),
        )
        .await
        .unwrap();

        clock.advance(Duration::minutes(3));

        let Json(updated) = update_note(
            State(state),
            AuthUser(user),
            Path(note.id),
            Json(UpdateNoteRequest {
                content: Some("Final".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Plan");
        assert_eq!(updated.content, "Final");
        assert_eq!(updated.category, "Work");
        assert_eq!(updated.note_type, "sticky");
        assert_eq!(updated.updated_at - note.updated_at, Duration::minutes(3));
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let (state, _clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");

        let result = create_note(
            State(state),
            AuthUser(user),
            Json(CreateNoteRequest {
                category: Some("Recipes".to_string()),
                ..Default::default()
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
